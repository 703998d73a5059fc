use std::sync::Arc;

use errors::GatewayError;
use gateway::{GatewayRequest, ModelGateway};
use report_core::{ChatMessage, ConfidenceLevel, RelatedFactor, UsageRecord};
use serde::Deserialize;
use tracing::warn;

use crate::prompts;

/// What the explain handler is asked about.
#[derive(Debug, Clone, Copy)]
pub struct ExplainTarget<'a> {
    pub section: &'a str,
    pub field: Option<&'a str>,
    pub what_to_explain: &'a str
}

#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub explanation: String,
    pub confidence: ConfidenceLevel,
    pub related_factors: Vec<RelatedFactor>,
    pub usage: UsageRecord,
    pub model: String,
    /// The model reply could not be read as structured JSON
    pub unstructured: bool
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExplanation {
    explanation: String,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    related_factors: Vec<RelatedFactor>
}

/// Produces structured, non-streamed explanations.
pub struct ExplainHandler {
    gateway: Arc<dyn ModelGateway>,
    model: String,
    max_tokens: u32
}

impl ExplainHandler {
    pub fn new(gateway: Arc<dyn ModelGateway>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            gateway,
            model: model.into(),
            max_tokens
        }
    }

    pub async fn explain(
        &self,
        target: ExplainTarget<'_>,
        context: &str,
        history: &[ChatMessage],
        message: &str
    ) -> Result<Explanation, GatewayError> {
        let messages = prompts::explain_messages(
            target.section,
            target.field,
            target.what_to_explain,
            context,
            history,
            message
        );
        let request = GatewayRequest::new(&self.model, messages)
            .temperature(0.3)
            .max_tokens(self.max_tokens)
            .json_mode(true);

        let response = self.gateway.chat(request).await?;
        Ok(match parse_explanation(&response.content) {
            Some(raw) => Explanation {
                explanation: raw.explanation,
                confidence: raw
                    .confidence
                    .as_deref()
                    .and_then(|c| c.trim().to_lowercase().parse().ok())
                    .unwrap_or(ConfidenceLevel::Medium),
                related_factors: raw.related_factors,
                usage: response.usage,
                model: response.model,
                unstructured: false
            },
            None => {
                warn!(model = %self.model, "Explanation was not valid JSON, returning raw text");
                Explanation {
                    explanation: response.content.trim().to_string(),
                    confidence: ConfidenceLevel::Low,
                    related_factors: Vec::new(),
                    usage: response.usage,
                    model: response.model,
                    unstructured: true
                }
            }
        })
    }
}

fn parse_explanation(output: &str) -> Option<RawExplanation> {
    let start = output.find('{')?;
    let end = output.rfind('}').filter(|end| *end > start)?;
    serde_json::from_str::<RawExplanation>(&output[start..=end])
        .ok()
        .filter(|raw| !raw.explanation.trim().is_empty())
}
