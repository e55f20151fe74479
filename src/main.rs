mod client;
mod config;
mod content;
mod errors;
mod flows;
mod gemini;
mod models;
mod prompts;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

use crate::client::{DemoClient, GenerationClient};
use crate::config::{key_preview, Settings};
use crate::gemini::GeminiClient;
use crate::prompts::PromptRegistry;
use crate::routes::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let settings = Settings::from_env().context("invalid configuration")?;

    let client: Arc<dyn GenerationClient> = match settings.gemini.clone() {
        Some(gemini) => {
            tracing::info!(
                "Using API key: {}... with model {}",
                key_preview(&gemini.api_key),
                gemini.model
            );
            Arc::new(GeminiClient::new(gemini).context("failed to build Gemini client")?)
        }
        None => {
            tracing::warn!("⚠️ GEMINI_API_KEY not set - running in demo mode with canned output");
            Arc::new(DemoClient)
        }
    };
    tracing::info!("Generated text language: {}", settings.output_language);

    let state = AppState {
        client,
        prompts: Arc::new(PromptRegistry::new(settings.output_language.clone())),
    };
    let app = router(state, settings.max_upload_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
