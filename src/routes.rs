use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::client::GenerationClient;
use crate::content::{generate_content_report, outcome_from, try_generate_content, ContentReport};
use crate::errors::CoreError;
use crate::models::{AggregatedOutcome, DescriptionLength, GenerateContentInput, ImagePayload, TargetMarket};
use crate::prompts::PromptRegistry;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn GenerationClient>,
    pub prompts: Arc<PromptRegistry>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/options", get(options))
        .route("/api/generate", post(generate))
        .route("/api/generate/upload", post(generate_upload))
        .route("/api/generate/report", post(generate_report))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                    tracing::info_span!("request", id = %Uuid::new_v4(), method = %req.method(), uri = %req.uri())
                }))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::MissingInput | CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Generation(_) => StatusCode::BAD_GATEWAY,
    }
}

async fn respond(state: &AppState, input: GenerateContentInput) -> (StatusCode, Json<AggregatedOutcome>) {
    let result = try_generate_content(state.client.as_ref(), &state.prompts, input).await;
    let status = result.as_ref().err().map(status_for).unwrap_or(StatusCode::OK);
    let outcome = outcome_from(result);
    tracing::info!(success = outcome.is_success(), %status, "Request finished");
    (status, Json(outcome))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn options(State(state): State<AppState>) -> Json<serde_json::Value> {
    let markets: Vec<_> = TargetMarket::ALL
        .iter()
        .map(|m| json!({ "id": m, "label": m.label() }))
        .collect();
    let lengths: Vec<_> = DescriptionLength::ALL.iter().map(|l| l.label()).collect();
    Json(json!({
        "targetMarkets": markets,
        "lengths": lengths,
        "defaultLength": DescriptionLength::default().label(),
        "outputLanguage": state.prompts.language(),
    }))
}

fn json_input(
    body: Result<Json<GenerateContentInput>, JsonRejection>,
) -> Result<GenerateContentInput, (StatusCode, Json<AggregatedOutcome>)> {
    body.map(|Json(input)| input)
        .map_err(|rejection| reject(CoreError::validation(rejection.body_text())))
}

pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateContentInput>, JsonRejection>,
) -> (StatusCode, Json<AggregatedOutcome>) {
    let body = match json_input(body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    tracing::info!("🚀 Generating content for target market '{}'", body.target_market);
    respond(&state, body).await
}

/// Multipart variant: the uploaded file is encoded into a data URI here.
pub async fn generate_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<AggregatedOutcome>) {
    let mut input = GenerateContentInput::default();
    let mut upload: Option<(Bytes, Option<String>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return reject(CoreError::validation(format!("Invalid form data: {}", e.body_text()))),
        };
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let content_type = field.content_type().map(str::to_string);
            match field.bytes().await {
                Ok(data) => upload = Some((data, content_type)),
                Err(e) => return reject(CoreError::validation(format!("Could not read image: {}", e.body_text()))),
            }
            continue;
        }
        let value = match field.text().await {
            Ok(v) => v,
            Err(e) => return reject(CoreError::validation(format!("Could not read field '{name}': {}", e.body_text()))),
        };
        let value = Some(value).filter(|v| !v.trim().is_empty());
        match name.as_str() {
            "customPrompt" => input.custom_prompt = value,
            "targetMarket" => input.target_market = value.unwrap_or_default(),
            "length" => input.length = value,
            other => tracing::warn!("Ignoring unknown form field '{}'", other),
        }
    }

    if let Some((data, content_type)) = upload {
        match encode_upload(&data, content_type.as_deref()) {
            Ok(image) => input.image = image.as_str().to_string(),
            Err(e) => return reject(e),
        }
    }
    tracing::info!("🚀 Generating content from upload for target market '{}'", input.target_market);
    respond(&state, input).await
}

fn reject(err: CoreError) -> (StatusCode, Json<AggregatedOutcome>) {
    let status = status_for(&err);
    (status, Json(outcome_from(Err(err))))
}

/// Encodes uploaded bytes, sniffing the image format when the part has no usable content type.
pub fn encode_upload(data: &Bytes, content_type: Option<&str>) -> Result<ImagePayload, CoreError> {
    if data.is_empty() {
        return Err(CoreError::MissingInput);
    }
    let mime = match content_type {
        Some(ct) if ct.starts_with("image/") => ct.to_string(),
        _ => image::guess_format(data)
            .map(|f| f.to_mime_type().to_string())
            .map_err(|_| CoreError::validation("Please upload a valid image file."))?,
    };
    ImagePayload::encode(data, &mime)
}

pub async fn generate_report(
    State(state): State<AppState>,
    body: Result<Json<GenerateContentInput>, JsonRejection>,
) -> Result<Json<ContentReport>, (StatusCode, Json<AggregatedOutcome>)> {
    let body = json_input(body)?;
    generate_content_report(state.client.as_ref(), &state.prompts, body)
        .await
        .map(Json)
        .map_err(reject)
}
