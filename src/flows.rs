use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::client::GenerationClient;
use crate::errors::CoreError;
use crate::models::{
    AnalysisResult, DescriptionLength, DescriptionResult, GenerationRequest, ImagePayload, TargetMarket,
};
use crate::prompts::{PromptRegistry, RenderedPrompt};

#[derive(Debug, Clone, Default)]
pub struct AnalyzeImageInput {
    pub image: String,
}

#[derive(Debug, Clone, Default)]
pub struct DescribeInput {
    pub image: String,
    pub custom_prompt: Option<String>,
    pub target_market: String,
    pub length: Option<String>,
}

impl DescribeInput {
    pub fn validate(&self) -> Result<GenerationRequest, CoreError> {
        Ok(GenerationRequest {
            image: require_image(&self.image)?,
            custom_prompt: self
                .custom_prompt
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
            target_market: self.target_market.parse::<TargetMarket>()?,
            length: DescriptionLength::parse_optional(self.length.as_deref())?,
        })
    }
}

fn require_image(raw: &str) -> Result<ImagePayload, CoreError> {
    if raw.trim().is_empty() {
        return Err(CoreError::validation("Image is required."));
    }
    ImagePayload::parse(raw)
}

async fn call<T: DeserializeOwned>(
    client: &dyn GenerationClient,
    prompt: &RenderedPrompt,
) -> Result<T, CoreError> {
    debug!("Rendered {}: {}", prompt.id.name(), prompt.text());
    let output = client.invoke(prompt).await?;
    serde_json::from_value(output).map_err(|e| {
        CoreError::validation(format!("Model output for {} did not match its schema: {e}", prompt.id.name()))
    })
}

/// Describes the visible features of the product in the registry's output language.
#[instrument(level = "info", skip_all, fields(prompt = "analyzeUploadedImagePrompt"))]
pub async fn analyze_image(
    client: &dyn GenerationClient,
    registry: &PromptRegistry,
    input: AnalyzeImageInput,
) -> Result<AnalysisResult, CoreError> {
    let image = require_image(&input.image)?;
    info!("🎯 Analyzing image {}", image);
    let prompt = registry.render_analyze(&image)?;
    let result: AnalysisResult = call(client, &prompt).await?;
    info!("✅ Analysis generated ({} chars)", result.features.len());
    Ok(result)
}

/// Writes a marketing description tuned to the requested market and length.
#[instrument(level = "info", skip_all, fields(prompt = "generateProductDescriptionPrompt"))]
pub async fn generate_description(
    client: &dyn GenerationClient,
    registry: &PromptRegistry,
    input: DescribeInput,
) -> Result<DescriptionResult, CoreError> {
    let request = input.validate()?;
    info!(
        "🎯 Generating {} description for {} (custom instruction: {})",
        request.length.label(),
        request.target_market,
        request.custom_prompt.is_some()
    );
    let prompt = registry.render_describe(&request)?;
    let result: DescriptionResult = call(client, &prompt).await?;
    info!("✅ Description generated ({} chars)", result.product_description.len());
    Ok(result)
}
