use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::gemini::{GeminiConfig, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::prompts::DEFAULT_OUTPUT_LANGUAGE;

/// Placeholder key that switches the service into demo mode.
pub const DEMO_KEY: &str = "DEMO_KEY";

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub output_language: String,
    /// `None` means no usable API key; the demo client is used instead.
    pub gemini: Option<GeminiConfig>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let gemini = match get("GEMINI_API_KEY") {
            Some(api_key) if api_key != DEMO_KEY => Some(GeminiConfig {
                api_key,
                base_url: get("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                temperature: parse_or(&get, "GEMINI_TEMPERATURE", 0.7)?,
                timeout: get("GEMINI_TIMEOUT_SECS")
                    .map(|v| parse_value::<u64>("GEMINI_TIMEOUT_SECS", v))
                    .transpose()?
                    .map(Duration::from_secs),
            }),
            _ => None,
        };

        Ok(Self {
            port: parse_or(&get, "PORT", 8080)?,
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            output_language: get("OUTPUT_LANGUAGE").unwrap_or_else(|| DEFAULT_OUTPUT_LANGUAGE.to_string()),
            gemini,
        })
    }
}

/// First six characters of an API key, for startup logs.
pub fn key_preview(key: &str) -> String {
    key.chars().take(6).collect()
}

fn parse_value<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid { key, value })
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    get(key).map(|v| parse_value(key, v)).unwrap_or(Ok(default))
}
