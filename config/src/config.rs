//! # Configuration Structures
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization, with every field
//!   defaulted so partial files load
//! - Use `validator` for range and presence checks

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level configuration for the report assistant.
///
/// ## Usage
/// ```rust,no_run
/// use config::Config;
///
/// let config = Config::default();
/// println!("Listening on {}:{}", config.server.host, config.server.port);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct Config {
    /// HTTP listener
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    /// OpenAI-compatible model gateway
    #[serde(default)]
    #[validate(nested)]
    pub gateway: GatewayConfig,

    /// Model ids and generation parameters
    #[serde(default)]
    #[validate(nested)]
    pub models: ModelsConfig,

    /// Circuit breaker around gateway calls
    #[serde(default)]
    #[validate(nested)]
    pub circuit_breaker: CircuitBreakerSettings,

    /// Chunk retrieval for grounding
    #[serde(default)]
    #[validate(nested)]
    pub retrieval: RetrievalConfig,

    /// Logging and metrics
    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    #[validate(length(min = 1, max = 255))]
    pub host: String,

    #[serde(default = "default_server_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct GatewayConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_gateway_base_url")]
    #[validate(length(min = 1))]
    pub base_url: String,

    /// Bearer token; calls are unauthenticated when absent
    #[serde(default)]
    pub api_key: Option<String>,

    /// Default per-call timeout in seconds
    #[serde(default = "default_gateway_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,

    /// Timeout for establishing a streamed completion, in seconds
    #[serde(default = "default_gateway_stream_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub stream_timeout_secs: u64,

    /// Longest wait for the next fragment of an open stream, in seconds
    #[serde(default = "default_gateway_stream_idle_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub stream_idle_timeout_secs: u64
}

fn default_gateway_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    60
}

fn default_gateway_stream_timeout_secs() -> u64 {
    120
}

fn default_gateway_stream_idle_timeout_secs() -> u64 {
    30
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            api_key: None,
            timeout_secs: default_gateway_timeout_secs(),
            stream_timeout_secs: default_gateway_stream_timeout_secs(),
            stream_idle_timeout_secs: default_gateway_stream_idle_timeout_secs()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ModelsConfig {
    /// Model answering questions and proposing edits
    #[serde(default = "default_chat_model")]
    #[validate(length(min = 1))]
    pub chat_model: String,

    /// Small, low-latency model used for intent classification
    #[serde(default = "default_classifier_model")]
    #[validate(length(min = 1))]
    pub classifier_model: String,

    #[serde(default = "default_explain_model")]
    #[validate(length(min = 1))]
    pub explain_model: String,

    #[serde(default = "default_temperature")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    #[validate(range(min = 1, max = 32000))]
    pub max_tokens: u32
}

fn default_chat_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}

fn default_classifier_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_explain_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat_model: default_chat_model(),
            classifier_model: default_classifier_model(),
            explain_model: default_explain_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    #[validate(range(min = 1, max = 1000))]
    pub failure_threshold: u32,

    /// Seconds an open circuit waits before allowing a trial call
    #[serde(default = "default_reset_timeout_secs")]
    #[validate(range(min = 1, max = 3600))]
    pub reset_timeout_secs: u64
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    60
}

impl CircuitBreakerSettings {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RetrievalConfig {
    /// When false every answer is grounded on the document summary
    #[serde(default = "default_retrieval_enabled")]
    pub enabled: bool,

    /// Similarity-search service; retrieval is skipped when unset
    #[serde(default)]
    pub service_url: Option<String>,

    #[serde(default = "default_embedding_model")]
    #[validate(length(min = 1))]
    pub embedding_model: String,

    #[serde(default = "default_top_k")]
    #[validate(range(min = 1, max = 50))]
    pub top_k: usize,

    #[serde(default = "default_min_similarity")]
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub min_similarity: f32
}

fn default_retrieval_enabled() -> bool {
    true
}

fn default_embedding_model() -> String {
    "openai/text-embedding-3-small".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_min_similarity() -> f32 {
    0.65
}

impl RetrievalConfig {
    /// Retrieval runs only when enabled and a service is configured.
    pub fn is_active(&self) -> bool {
        self.enabled && self.service_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: default_retrieval_enabled(),
            service_url: None,
            embedding_model: default_embedding_model(),
            top_k: default_top_k(),
            min_similarity: default_min_similarity()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    #[validate(custom(function = "validate_log_level"))]
    pub log_level: String,

    /// Install the Prometheus recorder and serve `/metrics`
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn validate_log_level(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid log level"))
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_enabled: default_metrics_enabled()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.gateway.timeout(), Duration::from_secs(60));
        assert_eq!(config.gateway.stream_timeout(), Duration::from_secs(120));
        assert_eq!(config.gateway.stream_idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.models.max_tokens, 2000);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.reset_timeout(), Duration::from_secs(60));
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.min_similarity, 0.65);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: Config = toml::from_str("[models]\nchat_model = \"openai/gpt-4o\"\n").unwrap();
        assert_eq!(config.models.chat_model, "openai/gpt-4o");
        assert_eq!(config.models.classifier_model, "openai/gpt-4o-mini");
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_retrieval_active_requires_service() {
        let mut retrieval = RetrievalConfig::default();
        assert!(!retrieval.is_active());
        retrieval.service_url = Some("http://chunks:9000".to_string());
        assert!(retrieval.is_active());
        retrieval.enabled = false;
        assert!(!retrieval.is_active());
    }
}
