use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::errors::GenerationError;
use crate::prompts::{PromptId, RenderedPrompt};

/// The remote generation backend, seen as `invoke(prompt) -> structured output`.
///
/// Implementations own retries, rate limiting and model choice; callers only
/// see the JSON object produced for the prompt's output schema.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn invoke(&self, prompt: &RenderedPrompt) -> Result<serde_json::Value, GenerationError>;
}

/// Offline stand-in used when no API key is configured.
#[derive(Debug, Default, Clone)]
pub struct DemoClient;

#[async_trait]
impl GenerationClient for DemoClient {
    async fn invoke(&self, prompt: &RenderedPrompt) -> Result<serde_json::Value, GenerationError> {
        info!("Using demo mode - returning canned output for {}", prompt.id.name());
        Ok(match prompt.id {
            PromptId::AnalyzeImage => json!({
                "features": "Demo analysis: the product is shown on a plain background. Configure GEMINI_API_KEY for a real analysis."
            }),
            PromptId::GenerateDescription => json!({
                "productDescription": "Demo description: a versatile product for everyday use.\n\n- Durable materials\n- Clean, modern design"
            }),
        })
    }
}
