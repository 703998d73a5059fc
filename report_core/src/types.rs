use errors::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into()
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into()
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into()
        }
    }
}

/// Categorised purpose of one user message.
///
/// Exactly one variant is produced per message and routing over it is
/// exhaustive. Edit, Explain and Regenerate carry the slots the classifier
/// extracted from the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClassifiedIntent {
    Question,
    General,
    #[serde(rename_all = "camelCase")]
    Edit {
        section: String,
        field: Option<String>,
        desired_change: String
    },
    #[serde(rename_all = "camelCase")]
    Explain {
        section: String,
        field: Option<String>,
        what_to_explain: String
    },
    #[serde(rename_all = "camelCase")]
    Regenerate { section: String, instructions: String }
}

impl ClassifiedIntent {
    /// Label reported in response metadata and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifiedIntent::Question => "question",
            ClassifiedIntent::General => "general",
            ClassifiedIntent::Edit { .. } => "edit",
            ClassifiedIntent::Explain { .. } => "explain",
            ClassifiedIntent::Regenerate { .. } => "regenerate"
        }
    }

    pub fn section(&self) -> Option<&str> {
        match self {
            ClassifiedIntent::Edit { section, .. }
            | ClassifiedIntent::Explain { section, .. }
            | ClassifiedIntent::Regenerate { section, .. } => Some(section),
            ClassifiedIntent::Question | ClassifiedIntent::General => None
        }
    }
}

/// A scored document fragment owned by the retrieval collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextChunk {
    pub section: String,
    pub field_path: String,
    pub similarity: f32,
    pub text: String
}

impl ContextChunk {
    /// `section.fieldPath` provenance label.
    pub fn provenance(&self) -> String {
        if self.field_path.is_empty() {
            self.section.clone()
        } else {
            format!("{}.{}", self.section, self.field_path)
        }
    }
}

/// Which grounding path produced the context for a request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContextSource {
    Rag,
    Summary
}

/// Query embedding returned by an [`crate::EmbeddingService`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub usage: UsageRecord
}

/// A proposed field-level document mutation awaiting user confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEdit {
    pub section: String,
    pub field_path: String,
    pub old_value: Value,
    pub new_value: Value,
    pub explanation: String,
    pub diff_preview: String
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost: f64
}

impl UsageRecord {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, cost: f64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost
        }
    }

    pub fn add(&mut self, other: &UsageRecord) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.cost += other.cost;
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0 && self.cost == 0.0
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confidence {
    pub level: ConfidenceLevel,
    pub explanation: String
}

impl Confidence {
    pub fn new(level: ConfidenceLevel, explanation: impl Into<String>) -> Self {
        Self {
            level,
            explanation: explanation.into()
        }
    }
}

/// A document element cited by an explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedFactor {
    pub factor: String,
    #[serde(default)]
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
    #[serde(default = "default_relevance")]
    pub relevance: String
}

fn default_relevance() -> String {
    "medium".to_string()
}

/// Inbound chat request.
///
/// Every field defaults so that missing fields surface as a
/// [`ValidationError`] from [`ChatRequest::validate`] instead of a
/// deserialisation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub document: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default = "default_stream")]
    pub stream: bool
}

fn default_stream() -> bool {
    true
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, document: Value) -> Self {
        Self {
            message: message.into(),
            document,
            document_id: None,
            history: Vec::new(),
            stream: true
        }
    }

    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn non_streaming(mut self) -> Self {
        self.stream = false;
        self
    }

    /// Boundary checks performed before any model call.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.message.trim().is_empty() {
            return Err(ValidationError::missing("message"));
        }
        match &self.document {
            Value::Null => Err(ValidationError::missing("document")),
            Value::Object(_) => Ok(()),
            _ => Err(ValidationError::invalid("document", "must be a JSON object"))
        }
    }

    /// Non-blank document identifier, if any.
    pub fn document_id(&self) -> Option<&str> {
        self.document_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// The most recent `limit` history messages in conversation order.
    pub fn recent_history(&self, limit: usize) -> &[ChatMessage] {
        let start = self.history.len().saturating_sub(limit);
        &self.history[start..]
    }
}

/// Metadata attached to the terminal `done` event and to non-streaming
/// response bodies.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Wall-clock milliseconds from request receipt to completion.
    pub processing_time: u64,
    pub classification_cost: f64,
    pub classification_tokens: u64,
    pub intent_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_source: Option<ContextSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks_retrieved: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_tokens: Option<u64>,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_placeholder: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>
}

/// Terminal event of every stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoneEvent {
    pub done: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_quality: Option<ConfidenceLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_explanation: Option<String>,
    pub metadata: ResponseMetadata
}

impl DoneEvent {
    pub fn new(metadata: ResponseMetadata) -> Self {
        Self {
            done: true,
            error: false,
            sources: None,
            source_quality: None,
            confidence: None,
            confidence_explanation: None,
            metadata
        }
    }
}

/// One frame of the streaming protocol.
///
/// A well-formed stream is zero or more `Text` events, at most one `Edits`
/// event, an optional `Error`, and exactly one final `Done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Text {
        content: String
    },
    Edits {
        #[serde(rename = "pendingEdits")]
        pending_edits: Vec<PendingEdit>,
        confidence: ConfidenceLevel
    },
    Error {
        error: String
    },
    Done(DoneEvent)
}

impl StreamEvent {
    pub fn text(content: impl Into<String>) -> Self {
        StreamEvent::Text {
            content: content.into()
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done(_))
    }
}

/// Non-streaming response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub confidence: ConfidenceLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_edit: Option<PendingEdit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_edits: Option<Vec<PendingEdit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_factors: Option<Vec<RelatedFactor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_explanation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_regenerate: Option<bool>,
    pub metadata: ResponseMetadata
}

impl ChatResponse {
    pub fn new(response: impl Into<String>, confidence: ConfidenceLevel) -> Self {
        Self {
            response: response.into(),
            confidence,
            confidence_explanation: None,
            pending_edit: None,
            pending_edits: None,
            related_factors: None,
            is_explanation: None,
            is_regenerate: None,
            metadata: ResponseMetadata::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_intent_serialization_uses_type_tag() {
        let intent = ClassifiedIntent::Edit {
            section: "crossAnalysisSynthesis".to_string(),
            field: Some("recommendedPositioning".to_string()),
            desired_change: "focus on AI".to_string()
        };
        let value = serde_json::to_value(&intent).unwrap();
        assert_eq!(value["type"], "edit");
        assert_eq!(value["desiredChange"], "focus on AI");
        assert_eq!(intent.kind(), "edit");
        assert_eq!(intent.section(), Some("crossAnalysisSynthesis"));
        assert_eq!(ClassifiedIntent::General.section(), None);
    }

    #[test]
    fn test_usage_record_accumulates() {
        let mut total = UsageRecord::new(10, 5, 0.001);
        total.add(&UsageRecord::new(20, 10, 0.002));
        assert_eq!(total.prompt_tokens, 30);
        assert_eq!(total.completion_tokens, 15);
        assert_eq!(total.total_tokens, 45);
        assert!((total.cost - 0.003).abs() < 1e-9);
        assert!(UsageRecord::default().is_empty());
    }

    #[test]
    fn test_request_validation() {
        let doc = json!({"crossAnalysisSynthesis": {}});
        assert!(ChatRequest::new("hello", doc.clone()).validate().is_ok());

        let err = ChatRequest::new("   ", doc.clone()).validate().unwrap_err();
        assert_eq!(err, ValidationError::missing("message"));

        let err = ChatRequest::new("hi", Value::Null).validate().unwrap_err();
        assert_eq!(err.field(), "document");

        let err = ChatRequest::new("hi", json!([1, 2])).validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { .. }));
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: ChatRequest = serde_json::from_str(r#"{"documentId": "  "}"#).unwrap();
        assert!(request.stream);
        assert!(request.message.is_empty());
        assert_eq!(request.document_id(), None);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_recent_history_keeps_latest() {
        let history = (0..15)
            .map(|i| ChatMessage::user(format!("m{i}")))
            .collect::<Vec<_>>();
        let request = ChatRequest::new("q", json!({})).with_history(history);
        let recent = request.recent_history(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].content, "m5");
        assert_eq!(recent[9].content, "m14");
    }

    #[test]
    fn test_stream_event_wire_shapes() {
        let text = serde_json::to_value(StreamEvent::text("hi")).unwrap();
        assert_eq!(text, json!({"type": "text", "content": "hi"}));

        let edits = serde_json::to_value(StreamEvent::Edits {
            pending_edits: vec![],
            confidence: ConfidenceLevel::High
        })
        .unwrap();
        assert_eq!(edits["type"], "edits");
        assert_eq!(edits["confidence"], "high");
        assert!(edits["pendingEdits"].is_array());

        let mut done = DoneEvent::new(ResponseMetadata {
            intent_type: "question".to_string(),
            context_source: Some(ContextSource::Summary),
            ..Default::default()
        });
        let value = serde_json::to_value(StreamEvent::Done(done.clone())).unwrap();
        assert_eq!(value["type"], "done");
        assert_eq!(value["done"], true);
        assert!(value.get("error").is_none());
        assert_eq!(value["metadata"]["contextSource"], "summary");

        done.error = true;
        let value = serde_json::to_value(StreamEvent::Done(done)).unwrap();
        assert_eq!(value["error"], true);
    }

    #[test]
    fn test_stream_event_parses_back() {
        let raw = r#"{"type":"error","error":"boom"}"#;
        let event: StreamEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            StreamEvent::Error {
                error: "boom".to_string()
            }
        );
        assert!(!event.is_done());
    }

    #[test]
    fn test_chunk_provenance() {
        let chunk = ContextChunk {
            section: "marketOverview".to_string(),
            field_path: "trends[0]".to_string(),
            similarity: 0.8,
            text: "t".to_string()
        };
        assert_eq!(chunk.provenance(), "marketOverview.trends[0]");
    }
}
