//! Application state for the chat server.

use std::sync::Arc;
use std::time::Duration;

use assistant::{AssistantConfig, ReportAssistant};
use config::Config;
use context::{ContextBuilder, ContextBuilderConfig, HttpChunkRetriever, HttpChunkRetrieverConfig};
use gateway::{CircuitBreakerConfig, HttpGateway, HttpGatewayConfig};
use metrics_exporter_prometheus::PrometheusHandle;

const RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub assistant: ReportAssistant,
    /// Present when the Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>
}

impl AppState {
    #[must_use]
    pub fn new(assistant: ReportAssistant, metrics: Option<PrometheusHandle>) -> Self {
        Self { assistant, metrics }
    }

    /// Builds the production assistant from configuration.
    pub fn from_config(config: &Config, metrics: Option<PrometheusHandle>) -> Self {
        Self::new(build_assistant(config), metrics)
    }
}

/// Wires the HTTP gateway, context builder and router from configuration.
///
/// The gateway doubles as the embedding service for retrieval; query
/// embeddings run behind its separate `embedding-gateway` breaker.
pub fn build_assistant(config: &Config) -> ReportAssistant {
    let gateway = Arc::new(HttpGateway::new(HttpGatewayConfig {
        base_url: config.gateway.base_url.clone(),
        api_key: config.gateway.api_key.clone(),
        default_timeout: config.gateway.timeout(),
        stream_timeout: config.gateway.stream_timeout(),
        embedding_model: config.retrieval.embedding_model.clone(),
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: config.circuit_breaker.failure_threshold,
            reset_timeout: config.circuit_breaker.reset_timeout()
        }
    }));

    let service_url = config
        .retrieval
        .service_url
        .clone()
        .filter(|_| config.retrieval.is_active());
    let context = match service_url {
        Some(service_url) => {
            tracing::info!(%service_url, top_k = config.retrieval.top_k, "Chunk retrieval enabled");
            ContextBuilder::new(
                gateway.clone(),
                Arc::new(HttpChunkRetriever::new(HttpChunkRetrieverConfig {
                    service_url,
                    timeout: RETRIEVAL_TIMEOUT
                })),
                ContextBuilderConfig {
                    enabled: true,
                    top_k: config.retrieval.top_k,
                    min_similarity: config.retrieval.min_similarity
                }
            )
        }
        None => {
            tracing::info!("Chunk retrieval disabled; answers are grounded on the document summary");
            ContextBuilder::summary_only()
        }
    };

    ReportAssistant::new(
        gateway,
        context,
        AssistantConfig {
            chat_model: config.models.chat_model.clone(),
            classifier_model: config.models.classifier_model.clone(),
            explain_model: config.models.explain_model.clone(),
            temperature: config.models.temperature,
            max_tokens: config.models.max_tokens,
            stream_idle_timeout: config.gateway.stream_idle_timeout(),
            ..AssistantConfig::default()
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_assistant_copies_models() {
        let mut config = Config::default();
        config.models.chat_model = "openai/gpt-4o".to_string();
        config.models.max_tokens = 1200;

        let assistant = build_assistant(&config);

        assert_eq!(assistant.config().chat_model, "openai/gpt-4o");
        assert_eq!(assistant.config().max_tokens, 1200);
        assert_eq!(assistant.config().history_limit, 10);
    }

    #[test]
    fn test_gateway_breaker_follows_config() {
        let mut config = Config::default();
        config.circuit_breaker.failure_threshold = 3;

        let state = AppState::from_config(&config, None);
        let circuits = state.assistant.gateway().circuits();

        assert_eq!(circuits.len(), 2);
        assert_eq!(circuits[0].name, "model-gateway");
        assert_eq!(circuits[0].failure_threshold, 3);
        assert_eq!(circuits[1].name, "embedding-gateway");
        assert_eq!(circuits[1].failure_threshold, 3);
        assert!(state.metrics.is_none());
    }
}
