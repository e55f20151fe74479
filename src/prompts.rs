//! Prompt templates for the two generation capabilities.
//!
//! Each definition binds an input schema name, an output schema and a
//! template. Templates use `{{name}}` placeholders; `{{media}}` marks where
//! the product image is attached. Rendering is a single pass, so substituted
//! values (notably the user's custom instruction) are inserted verbatim and
//! never re-expanded.

use std::collections::HashMap;

use serde_json::json;

use crate::errors::CoreError;
use crate::models::{DescriptionLength, GenerationRequest, ImagePayload, TargetMarket};

pub const DEFAULT_OUTPUT_LANGUAGE: &str = "Indonesian";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    AnalyzeImage,
    GenerateDescription,
}

impl PromptId {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AnalyzeImage => "analyzeUploadedImagePrompt",
            Self::GenerateDescription => "generateProductDescriptionPrompt",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptDefinition {
    pub id: PromptId,
    pub input_schema: &'static str,
    pub output_schema: serde_json::Value,
    pub template: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    Text(String),
    Media(ImagePayload),
}

/// A fully substituted prompt, ready for the generation client.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub id: PromptId,
    pub parts: Vec<PromptPart>,
    pub output_schema: serde_json::Value,
}

impl RenderedPrompt {
    /// Text parts joined, with media shown as `[image]`. Used for logs and tests.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| match p {
                PromptPart::Text(t) => t.as_str(),
                PromptPart::Media(_) => "[image]",
            })
            .collect()
    }
}

const ANALYZE_TEMPLATE: &str = "You are an AI expert in product image analysis. Your task is to analyze the provided image and identify its key features and attributes that are relevant for creating a compelling product description in {{language}}.

Analyze the following image, and give a detailed description of its key features and attributes:

Image: {{media}}

Focus on aspects such as the product's material, color, design, functionality, and any unique selling points. Structure the description in a way that it can be directly used as a basis for generating the product description.
The description should be in {{language}}.";

const DESCRIBE_TEMPLATE: &str = "You are an expert marketer specializing in creating compelling product descriptions. Write a product description in {{language}} based on the provided product image, aimed at the {{market}} market. Emphasize the key features and benefits of the product to attract potential buyers.

Tone: {{tone}}

Length: {{length}}
{{custom}}
Formatting rules:
- Separate paragraphs with a blank line.
- Highlight key features as bullet points that start with a hyphen (-).
- Use correct punctuation and capitalization throughout.

Product Image: {{media}}

Product Description:";

const CUSTOM_INSTRUCTION_PREFIX: &str = "\nFollow these additional instructions: ";

/// Tone guidance per market.
pub fn tone_guidance(market: TargetMarket) -> &'static str {
    match market {
        TargetMarket::GenZ => "Casual, energetic and playful. Use current slang sparingly and feel free to add a few fitting emojis. Keep sentences short and punchy.",
        TargetMarket::YoungProfessionals => "Polished and confident. Focus on practical benefits, quality, efficiency and how the product fits a busy, modern lifestyle.",
        TargetMarket::Families => "Warm and reassuring. Emphasize safety, durability, ease of use and the value the product brings to the whole family.",
    }
}

pub fn length_guidance(length: DescriptionLength) -> &'static str {
    match length {
        DescriptionLength::Short => "Short, about 50-80 words.",
        DescriptionLength::Medium => "Medium, about 120-180 words.",
        DescriptionLength::Long => "Long, about 250-350 words.",
    }
}

fn text_schema(field: &str, description: &str) -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            field: { "type": "STRING", "description": description }
        },
        "required": [field]
    })
}

/// Holds the prompt definitions and the language generated text is written in.
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    language: String,
    analyze: PromptDefinition,
    describe: PromptDefinition,
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_LANGUAGE)
    }
}

impl PromptRegistry {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            analyze: PromptDefinition {
                id: PromptId::AnalyzeImage,
                input_schema: "AnalyzeUploadedImageInput",
                output_schema: text_schema(
                    "features",
                    "A detailed description of the key features and attributes of the product in the image.",
                ),
                template: ANALYZE_TEMPLATE,
            },
            describe: PromptDefinition {
                id: PromptId::GenerateDescription,
                input_schema: "GenerateProductDescriptionInput",
                output_schema: text_schema(
                    "productDescription",
                    "The generated product description in the target language.",
                ),
                template: DESCRIBE_TEMPLATE,
            },
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn get(&self, id: PromptId) -> &PromptDefinition {
        match id {
            PromptId::AnalyzeImage => &self.analyze,
            PromptId::GenerateDescription => &self.describe,
        }
    }

    pub fn render_analyze(&self, image: &ImagePayload) -> Result<RenderedPrompt, CoreError> {
        let vars = HashMap::from([("language", self.language.clone())]);
        render(self.get(PromptId::AnalyzeImage), &vars, image)
    }

    pub fn render_describe(&self, req: &GenerationRequest) -> Result<RenderedPrompt, CoreError> {
        let custom = match req.custom_prompt.as_deref() {
            Some(c) if !c.trim().is_empty() => format!("{CUSTOM_INSTRUCTION_PREFIX}{c}\n"),
            _ => String::new(),
        };
        let vars = HashMap::from([
            ("language", self.language.clone()),
            ("market", req.target_market.label().to_string()),
            ("tone", tone_guidance(req.target_market).to_string()),
            ("length", length_guidance(req.length).to_string()),
            ("custom", custom),
        ]);
        render(self.get(PromptId::GenerateDescription), &vars, &req.image)
    }
}

fn render(
    def: &PromptDefinition,
    vars: &HashMap<&str, String>,
    image: &ImagePayload,
) -> Result<RenderedPrompt, CoreError> {
    tracing::debug!(prompt = def.id.name(), input = def.input_schema, "rendering prompt");
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut rest = def.template;

    while let Some(open) = rest.find("{{") {
        text.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after.find("}}").ok_or_else(|| {
            CoreError::validation(format!("Unclosed placeholder in prompt '{}'", def.id.name()))
        })?;
        let name = after[..close].trim();
        if name == "media" {
            if !text.is_empty() {
                parts.push(PromptPart::Text(std::mem::take(&mut text)));
            }
            parts.push(PromptPart::Media(image.clone()));
        } else {
            let value = vars.get(name).ok_or_else(|| {
                CoreError::validation(format!(
                    "Prompt '{}' has no value for placeholder '{name}'",
                    def.id.name()
                ))
            })?;
            text.push_str(value);
        }
        rest = &after[close + 2..];
    }
    text.push_str(rest);
    if !text.is_empty() {
        parts.push(PromptPart::Text(text));
    }

    Ok(RenderedPrompt { id: def.id, parts, output_schema: def.output_schema.clone() })
}
