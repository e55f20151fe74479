//! Fan-out of the analyze and describe flows and the join of their results.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use tracing::{error, info};

use crate::client::GenerationClient;
use crate::errors::CoreError;
use crate::flows::{analyze_image, generate_description, AnalyzeImageInput, DescribeInput};
use crate::models::{AggregatedOutcome, AnalysisResult, DescriptionResult, GenerateContentInput, GeneratedContent};
use crate::prompts::PromptRegistry;

/// Outcome of a single flow, kept even when its sibling failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowReport<T> {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: FlowOutcome<T>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FlowOutcome<T> {
    Ok { value: T },
    Error { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentReport {
    pub analysis: FlowReport<AnalysisResult>,
    pub description: FlowReport<DescriptionResult>,
    #[serde(skip)]
    errors: (Option<CoreError>, Option<CoreError>),
}

impl ContentReport {
    /// Both results, or the first failure (analysis before description).
    pub fn into_result(self) -> Result<GeneratedContent, CoreError> {
        match (self.errors, self.analysis.outcome, self.description.outcome) {
            ((Some(e), _), _, _) | ((None, Some(e)), _, _) => Err(e),
            (_, FlowOutcome::Ok { value: a }, FlowOutcome::Ok { value: d }) => Ok(GeneratedContent {
                analysis: a.features,
                description: d.product_description,
            }),
            // an Error outcome is always paired with a stored CoreError
            (_, FlowOutcome::Error { error }, _) | (_, _, FlowOutcome::Error { error }) => {
                Err(CoreError::Generation(error))
            }
        }
    }
}

async fn timed<T, F>(fut: F) -> (FlowReport<T>, Option<CoreError>)
where
    F: Future<Output = Result<T, CoreError>>,
{
    let started_at = Utc::now();
    let result = fut.await;
    let finished_at = Utc::now();
    let (outcome, err) = match result {
        Ok(value) => (FlowOutcome::Ok { value }, None),
        Err(e) => (FlowOutcome::Error { error: e.user_message() }, Some(e)),
    };
    (FlowReport { started_at, finished_at, outcome }, err)
}

/// Runs both flows concurrently and keeps each flow's result.
///
/// Dropping the returned future drops both in-flight requests.
pub async fn generate_content_report(
    client: &dyn GenerationClient,
    registry: &PromptRegistry,
    input: GenerateContentInput,
) -> Result<ContentReport, CoreError> {
    if input.image.trim().is_empty() {
        return Err(CoreError::MissingInput);
    }
    let analyze_input = AnalyzeImageInput { image: input.image.clone() };
    let describe_input = DescribeInput {
        image: input.image,
        custom_prompt: input.custom_prompt,
        target_market: input.target_market,
        length: input.length,
    };

    let ((analysis, analysis_err), (description, description_err)) = tokio::join!(
        timed(analyze_image(client, registry, analyze_input)),
        timed(generate_description(client, registry, describe_input))
    );
    Ok(ContentReport { analysis, description, errors: (analysis_err, description_err) })
}

/// Fail-fast join: any flow error discards the other flow's result.
pub async fn try_generate_content(
    client: &dyn GenerationClient,
    registry: &PromptRegistry,
    input: GenerateContentInput,
) -> Result<GeneratedContent, CoreError> {
    generate_content_report(client, registry, input).await?.into_result()
}

/// Caller-facing entry point: always yields either both texts or one error message.
pub async fn generate_content(
    client: &dyn GenerationClient,
    registry: &PromptRegistry,
    input: GenerateContentInput,
) -> AggregatedOutcome {
    outcome_from(try_generate_content(client, registry, input).await)
}

pub fn outcome_from(result: Result<GeneratedContent, CoreError>) -> AggregatedOutcome {
    match result {
        Ok(content) => {
            info!("✅ Content generated (analysis {} chars, description {} chars)", content.analysis.len(), content.description.len());
            content.into()
        }
        Err(e) => {
            error!("❌ Error generating content: {:?}", e);
            AggregatedOutcome::Failure { error: e.user_message() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GenerationError;
    use crate::flows::tests::ScriptedClient;
    use crate::models::tests::PNG_URI;
    use crate::prompts::{PromptId, RenderedPrompt};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Barrier;

    fn input(market: &str) -> GenerateContentInput {
        GenerateContentInput {
            image: PNG_URI.into(),
            custom_prompt: None,
            target_market: market.into(),
            length: None,
        }
    }

    #[tokio::test]
    async fn both_flows_succeed() {
        let client = ScriptedClient::succeeding("Matte black bottle", "Stay hydrated in style.");
        for market in ["Gen Z", "Young Professionals", "Families"] {
            let out = generate_content(&client, &PromptRegistry::default(), input(market)).await;
            assert_eq!(
                out,
                AggregatedOutcome::Success {
                    analysis: "Matte black bottle".into(),
                    description: "Stay hydrated in style.".into(),
                }
            );
        }
        assert_eq!(client.call_count(), 6);
    }

    #[tokio::test]
    async fn missing_image_never_calls_the_model() {
        let client = ScriptedClient::succeeding("x", "y");
        for image in ["", "   "] {
            let out = generate_content(
                &client,
                &PromptRegistry::default(),
                GenerateContentInput { image: image.into(), ..input("Gen Z") },
            )
            .await;
            assert_eq!(out, AggregatedOutcome::Failure { error: "No image data provided.".into() });
        }
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn analyze_failure_discards_description() {
        let client = ScriptedClient {
            analyze: Some(Err("vision model unavailable".into())),
            describe: Some(Ok(json!({ "productDescription": "Great product" }))),
            ..Default::default()
        };
        let out = generate_content(&client, &PromptRegistry::default(), input("Families")).await;
        assert_eq!(out, AggregatedOutcome::Failure { error: "vision model unavailable".into() });
        // the describe call still ran to completion
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn analysis_error_wins_when_both_fail() {
        let client = ScriptedClient {
            analyze: Some(Err("first".into())),
            describe: Some(Err("second".into())),
            ..Default::default()
        };
        let out = generate_content(&client, &PromptRegistry::default(), input("Gen Z")).await;
        assert_eq!(out, AggregatedOutcome::Failure { error: "first".into() });
    }

    #[tokio::test]
    async fn invalid_market_surfaces_validation_message() {
        let client = ScriptedClient::succeeding("x", "y");
        let out = generate_content(&client, &PromptRegistry::default(), input("Pets")).await;
        match out {
            AggregatedOutcome::Failure { error } => assert!(error.contains("Unknown target market 'Pets'")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_outputs_pass_through() {
        let client = ScriptedClient::succeeding("", "");
        let out = generate_content(&client, &PromptRegistry::default(), input("Gen Z")).await;
        assert_eq!(out, AggregatedOutcome::Success { analysis: String::new(), description: String::new() });
    }

    #[tokio::test]
    async fn blank_generation_error_gets_generic_message() {
        let client = ScriptedClient { describe: Some(Err(String::new())), ..ScriptedClient::succeeding("x", "y") };
        let out = generate_content(&client, &PromptRegistry::default(), input("Gen Z")).await;
        assert_eq!(
            out,
            AggregatedOutcome::Failure { error: "An unknown error occurred during content generation.".into() }
        );
    }

    #[tokio::test]
    async fn report_keeps_partial_success() {
        let client = ScriptedClient {
            analyze: Some(Ok(json!({ "features": "Oak wood" }))),
            describe: Some(Err("quota".into())),
            ..Default::default()
        };
        let report = generate_content_report(&client, &PromptRegistry::default(), input("Families"))
            .await
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["analysis"]["status"], "ok");
        assert_eq!(json["analysis"]["value"]["features"], "Oak wood");
        assert_eq!(json["description"]["status"], "error");
        assert_eq!(json["description"]["error"], "quota");
        assert!(report.analysis.started_at <= report.analysis.finished_at);
        assert_eq!(report.into_result(), Err(CoreError::Generation("quota".into())));
    }

    /// Each call waits until the other has started; serialized calls would deadlock.
    struct RendezvousClient {
        barrier: Barrier,
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationClient for RendezvousClient {
        async fn invoke(&self, prompt: &RenderedPrompt) -> Result<serde_json::Value, GenerationError> {
            self.events.lock().push(format!("start {}", prompt.id.name()));
            self.barrier.wait().await;
            self.events.lock().push(format!("end {}", prompt.id.name()));
            Ok(match prompt.id {
                PromptId::AnalyzeImage => json!({ "features": "f" }),
                PromptId::GenerateDescription => json!({ "productDescription": "d" }),
            })
        }
    }

    #[tokio::test]
    async fn flows_run_concurrently() {
        let client = RendezvousClient { barrier: Barrier::new(2), events: Mutex::default() };
        let out = tokio::time::timeout(
            Duration::from_secs(5),
            generate_content(&client, &PromptRegistry::default(), input("Gen Z")),
        )
        .await
        .expect("flows were serialized");
        assert!(out.is_success());

        let events = client.events.lock().clone();
        let first_end = events.iter().position(|e| e.starts_with("end")).unwrap();
        assert_eq!(events[..first_end].iter().filter(|e| e.starts_with("start")).count(), 2);
    }
}
