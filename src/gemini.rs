use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::IgnoredAny, Deserialize};
use serde_json::json;
use tracing::{error, info};

use crate::client::GenerationClient;
use crate::errors::GenerationError;
use crate::prompts::{PromptPart, RenderedPrompt};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Option<Duration>,
}

pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| GenerationError::Other(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn request_body(&self, prompt: &RenderedPrompt) -> serde_json::Value {
        let parts: Vec<serde_json::Value> = prompt
            .parts
            .iter()
            .map(|p| match p {
                PromptPart::Text(text) => json!({ "text": text }),
                PromptPart::Media(image) => json!({
                    "inlineData": { "mimeType": image.mime_type(), "data": image.data() }
                }),
            })
            .collect();

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "candidateCount": 1,
                "responseMimeType": "application/json",
                "responseSchema": prompt.output_schema
            }
        })
    }

    async fn perform_api_call(&self, prompt: &RenderedPrompt) -> Result<String, GenerationError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        info!("🔗 Making {} request to: {}", prompt.id.name(), url);

        let request_body = self.request_body(prompt);
        let mut logged = request_body.clone();
        truncate_base64_in_json(&mut logged);
        info!("📤 Request body: {}", logged);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.without_url().to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);
        let response_text = response
            .text()
            .await
            .map_err(|e| GenerationError::Http(e.without_url().to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GenerationError::Status { status: status.as_u16(), body: response_text });
        }
        Ok(response_text)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn invoke(&self, prompt: &RenderedPrompt) -> Result<serde_json::Value, GenerationError> {
        let raw = self.perform_api_call(prompt).await?;
        let parsed: GeminiResponse =
            serde_json::from_str(&raw).map_err(|e| GenerationError::Parse(format!("response envelope: {e}")))?;
        let text = extract_text(parsed)?;
        info!("✅ {} returned {} chars", prompt.id.name(), text.len());
        serde_json::from_str(&text).map_err(|e| GenerationError::Parse(e.to_string()))
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Other(IgnoredAny),
}

fn extract_text(resp: GeminiResponse) -> Result<String, GenerationError> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerationError::Refused(reason));
    }
    let candidate = resp.candidates.into_iter().next().ok_or(GenerationError::Empty)?;
    let text: String = candidate
        .content
        .parts
        .into_iter()
        .filter_map(|p| match p {
            Part::Text { text } => Some(text),
            Part::Other(_) => None,
        })
        .collect();
    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_default();
        if matches!(reason.as_str(), "SAFETY" | "RECITATION" | "PROHIBITED_CONTENT") {
            return Err(GenerationError::Refused(reason));
        }
        return Err(GenerationError::Empty);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{tests::PNG_URI, ImagePayload};
    use crate::prompts::PromptRegistry;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> GeminiClient {
        GeminiClient::new(GeminiConfig {
            api_key: "test-key".into(),
            base_url: base.into(),
            model: "gemini-test".into(),
            temperature: 0.4,
            timeout: Some(Duration::from_secs(5)),
        })
        .unwrap()
    }

    fn analyze_prompt() -> RenderedPrompt {
        let img = ImagePayload::parse(PNG_URI).unwrap();
        PromptRegistry::default().render_analyze(&img).unwrap()
    }

    #[tokio::test]
    async fn sends_image_and_schema_and_parses_json_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": { "required": ["features"] }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"candidates":[{"content":{"parts":[{"text":"{\"features\":\"Red ceramic mug\"}"}]}}]}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let out = client(&server.uri()).invoke(&analyze_prompt()).await.unwrap();
        assert_eq!(out, json!({ "features": "Red ceramic mug" }));
    }

    #[test]
    fn request_body_inlines_image() {
        let body = client("http://localhost").request_body(&analyze_prompt());
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[1], json!({ "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).invoke(&analyze_prompt()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Status { status: 429, ref body } if body == "quota exceeded"));
    }

    #[tokio::test]
    async fn blocked_prompt_is_refused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "promptFeedback": { "blockReason": "SAFETY" } })),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri()).invoke(&analyze_prompt()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Refused(ref r) if r == "SAFETY"));
    }

    #[tokio::test]
    async fn non_json_text_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Sure! Here it is." }] } }]
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri()).invoke(&analyze_prompt()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Parse(_)));
    }

    #[test]
    fn non_text_parts_are_skipped() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": "AAAA" } },
                { "text": "{\"features\":\"x\"}" }
            ] } }]
        }))
        .unwrap();
        assert_eq!(extract_text(resp).unwrap(), r#"{"features":"x"}"#);
    }

    #[test]
    fn empty_candidates_are_reported() {
        let resp: GeminiResponse = serde_json::from_value(json!({ "candidates": [] })).unwrap();
        assert!(matches!(extract_text(resp), Err(GenerationError::Empty)));
    }

    #[test]
    fn truncates_long_base64_for_logs() {
        let mut v = json!({ "inlineData": { "data": "A".repeat(200) } });
        truncate_base64_in_json(&mut v);
        assert_eq!(v["inlineData"]["data"], json!(format!("{}...[truncated 150 chars]", "A".repeat(50))));
    }
}
