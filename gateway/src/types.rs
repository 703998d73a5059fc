use std::time::Duration;

use errors::GatewayError;
use futures_util::stream::BoxStream;
use report_core::{ChatMessage, UsageRecord};

use crate::citations::CitationPayload;

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-call timeout; the gateway default applies when unset.
    pub timeout: Option<Duration>,
    /// Ask for a JSON object response. Only honoured for models that
    /// support it.
    pub json_mode: bool
}

impl GatewayRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            max_tokens: 2000,
            timeout: None,
            json_mode: false
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub content: String,
    pub model: String,
    pub usage: UsageRecord,
    pub citations: CitationPayload
}

impl GatewayResponse {
    pub fn text(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage: UsageRecord::default(),
            citations: CitationPayload::None
        }
    }

    pub fn with_usage(mut self, usage: UsageRecord) -> Self {
        self.usage = usage;
        self
    }
}

/// Item of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Text(String),
    /// Final usage, when the provider reports it on the last frame.
    Usage(UsageRecord)
}

/// Lazy, finite stream of completion chunks. Ends when the provider signals
/// completion; cannot be resumed.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, GatewayError>>;
