use std::sync::Arc;
use std::time::Duration;

use errors::ClassificationError;
use gateway::{GatewayRequest, ModelGateway};
use report_core::{ClassifiedIntent, UsageRecord};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::prompts;

const CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of classifying one message. Always carries an intent.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: ClassifiedIntent,
    pub usage: UsageRecord,
    /// Set when the intent is the General fallback after a failure.
    pub fallback_reason: Option<String>
}

impl Classification {
    fn fallback(usage: UsageRecord, error: &ClassificationError) -> Self {
        Self {
            intent: ClassifiedIntent::General,
            usage,
            fallback_reason: Some(error.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIntent {
    intent: String,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    desired_change: Option<String>,
    #[serde(default)]
    what_to_explain: Option<String>,
    #[serde(default)]
    instructions: Option<String>
}

pub struct IntentClassifier {
    gateway: Arc<dyn ModelGateway>,
    model: String
}

impl IntentClassifier {
    pub fn new(gateway: Arc<dyn ModelGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into()
        }
    }

    /// Classifies `message` with one small-model call. Failures degrade to
    /// [`ClassifiedIntent::General`].
    pub async fn classify(&self, message: &str) -> Classification {
        let request = GatewayRequest::new(&self.model, prompts::classifier_messages(message))
            .temperature(0.0)
            .max_tokens(300)
            .timeout(CLASSIFIER_TIMEOUT)
            .json_mode(true);

        let response = match self.gateway.chat(request).await {
            Ok(response) => response,
            Err(e) => {
                let error = ClassificationError::from(e);
                warn!(error = %error, "Intent classification failed, treating as general");
                return Classification::fallback(UsageRecord::default(), &error);
            }
        };

        match parse_intent(&response.content) {
            Ok(intent) => {
                debug!(intent = intent.kind(), "Classified message");
                Classification {
                    intent,
                    usage: response.usage,
                    fallback_reason: None
                }
            }
            Err(error) => {
                warn!(error = %error, "Unusable classifier output, treating as general");
                Classification::fallback(response.usage, &error)
            }
        }
    }
}

/// Parses classifier output into an intent.
///
/// Tolerates prose around the JSON object. Edit, Explain and Regenerate
/// require a target section; without one they are rejected as malformed.
pub fn parse_intent(output: &str) -> Result<ClassifiedIntent, ClassificationError> {
    let start = output
        .find('{')
        .ok_or_else(|| malformed("no JSON object found"))?;
    let end = output
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| malformed("unterminated JSON object"))?;
    let raw: RawIntent =
        serde_json::from_str(&output[start..=end]).map_err(|e| malformed(&e.to_string()))?;

    let section = non_empty(raw.section);
    let field = non_empty(raw.field);
    let label = raw.intent.trim().to_lowercase();

    let intent = match label.as_str() {
        "question" => ClassifiedIntent::Question,
        "general" => ClassifiedIntent::General,
        "edit" => ClassifiedIntent::Edit {
            section: section.ok_or_else(|| malformed("edit intent without section"))?,
            field,
            desired_change: non_empty(raw.desired_change).unwrap_or_default()
        },
        "explain" => ClassifiedIntent::Explain {
            section: section.ok_or_else(|| malformed("explain intent without section"))?,
            field,
            what_to_explain: non_empty(raw.what_to_explain).unwrap_or_default()
        },
        "regenerate" => ClassifiedIntent::Regenerate {
            section: section.ok_or_else(|| malformed("regenerate intent without section"))?,
            instructions: non_empty(raw.instructions).unwrap_or_default()
        },
        _ => return Err(ClassificationError::UnknownIntent { label })
    };
    Ok(intent)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "null")
}

fn malformed(reason: &str) -> ClassificationError {
    ClassificationError::MalformedOutput {
        reason: reason.to_string()
    }
}
