//! # Environment Variable Loader
//!
//! Loads configuration from `RA_*` environment variables. Unset variables
//! keep their defaults; set but unparsable variables are an error.
//!
//! | Variable                          | Field                                |
//! |-----------------------------------|--------------------------------------|
//! | `RA_HOST`, `RA_PORT`              | `server.host`, `server.port`         |
//! | `RA_GATEWAY_BASE_URL`             | `gateway.base_url`                   |
//! | `RA_GATEWAY_API_KEY`              | `gateway.api_key`                    |
//! | `RA_GATEWAY_TIMEOUT_SECS`         | `gateway.timeout_secs`               |
//! | `RA_GATEWAY_STREAM_TIMEOUT_SECS`  | `gateway.stream_timeout_secs`        |
//! | `RA_GATEWAY_STREAM_IDLE_SECS`     | `gateway.stream_idle_timeout_secs`   |
//! | `RA_CHAT_MODEL`                   | `models.chat_model`                  |
//! | `RA_CLASSIFIER_MODEL`             | `models.classifier_model`            |
//! | `RA_EXPLAIN_MODEL`                | `models.explain_model`               |
//! | `RA_TEMPERATURE`                  | `models.temperature`                 |
//! | `RA_MAX_TOKENS`                   | `models.max_tokens`                  |
//! | `RA_CB_FAILURE_THRESHOLD`         | `circuit_breaker.failure_threshold`  |
//! | `RA_CB_RESET_TIMEOUT_SECS`        | `circuit_breaker.reset_timeout_secs` |
//! | `RA_RETRIEVAL_ENABLED`            | `retrieval.enabled`                  |
//! | `RA_RETRIEVAL_SERVICE_URL`        | `retrieval.service_url`              |
//! | `RA_EMBEDDING_MODEL`              | `retrieval.embedding_model`          |
//! | `RA_RETRIEVAL_TOP_K`              | `retrieval.top_k`                    |
//! | `RA_RETRIEVAL_MIN_SIMILARITY`     | `retrieval.min_similarity`           |
//! | `RA_LOG_LEVEL`                    | `observability.log_level`            |
//! | `RA_METRICS_ENABLED`              | `observability.metrics_enabled`      |

use std::env;
use std::str::FromStr;

use crate::config::{
    CircuitBreakerSettings, Config, GatewayConfig, ModelsConfig, ObservabilityConfig,
    RetrievalConfig, ServerConfig
};

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String
    }
}

/// Load configuration from environment variables.
///
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_env()?;
///     println!("Chat model: {}", config.models.chat_model);
///     Ok(())
/// }
/// ```
pub fn load_from_env() -> Result<Config, EnvError> {
    Ok(Config {
        server: load_server_from_env()?,
        gateway: load_gateway_from_env()?,
        models: load_models_from_env()?,
        circuit_breaker: load_circuit_breaker_from_env()?,
        retrieval: load_retrieval_from_env()?,
        observability: load_observability_from_env()?
    })
}

fn load_server_from_env() -> Result<ServerConfig, EnvError> {
    let defaults = ServerConfig::default();
    Ok(ServerConfig {
        host: env_string("RA_HOST").unwrap_or(defaults.host),
        port: parse_env("RA_PORT")?.unwrap_or(defaults.port)
    })
}

fn load_gateway_from_env() -> Result<GatewayConfig, EnvError> {
    let defaults = GatewayConfig::default();
    Ok(GatewayConfig {
        base_url: env_string("RA_GATEWAY_BASE_URL").unwrap_or(defaults.base_url),
        api_key: env_string("RA_GATEWAY_API_KEY"),
        timeout_secs: parse_env("RA_GATEWAY_TIMEOUT_SECS")?.unwrap_or(defaults.timeout_secs),
        stream_timeout_secs: parse_env("RA_GATEWAY_STREAM_TIMEOUT_SECS")?
            .unwrap_or(defaults.stream_timeout_secs),
        stream_idle_timeout_secs: parse_env("RA_GATEWAY_STREAM_IDLE_SECS")?
            .unwrap_or(defaults.stream_idle_timeout_secs)
    })
}

fn load_models_from_env() -> Result<ModelsConfig, EnvError> {
    let defaults = ModelsConfig::default();
    Ok(ModelsConfig {
        chat_model: env_string("RA_CHAT_MODEL").unwrap_or(defaults.chat_model),
        classifier_model: env_string("RA_CLASSIFIER_MODEL").unwrap_or(defaults.classifier_model),
        explain_model: env_string("RA_EXPLAIN_MODEL").unwrap_or(defaults.explain_model),
        temperature: parse_env("RA_TEMPERATURE")?.unwrap_or(defaults.temperature),
        max_tokens: parse_env("RA_MAX_TOKENS")?.unwrap_or(defaults.max_tokens)
    })
}

fn load_circuit_breaker_from_env() -> Result<CircuitBreakerSettings, EnvError> {
    let defaults = CircuitBreakerSettings::default();
    Ok(CircuitBreakerSettings {
        failure_threshold: parse_env("RA_CB_FAILURE_THRESHOLD")?
            .unwrap_or(defaults.failure_threshold),
        reset_timeout_secs: parse_env("RA_CB_RESET_TIMEOUT_SECS")?
            .unwrap_or(defaults.reset_timeout_secs)
    })
}

fn load_retrieval_from_env() -> Result<RetrievalConfig, EnvError> {
    let defaults = RetrievalConfig::default();
    Ok(RetrievalConfig {
        enabled: parse_env("RA_RETRIEVAL_ENABLED")?.unwrap_or(defaults.enabled),
        service_url: env_string("RA_RETRIEVAL_SERVICE_URL"),
        embedding_model: env_string("RA_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
        top_k: parse_env("RA_RETRIEVAL_TOP_K")?.unwrap_or(defaults.top_k),
        min_similarity: parse_env("RA_RETRIEVAL_MIN_SIMILARITY")?
            .unwrap_or(defaults.min_similarity)
    })
}

fn load_observability_from_env() -> Result<ObservabilityConfig, EnvError> {
    let defaults = ObservabilityConfig::default();
    Ok(ObservabilityConfig {
        log_level: env_string("RA_LOG_LEVEL").unwrap_or(defaults.log_level),
        metrics_enabled: parse_env("RA_METRICS_ENABLED")?.unwrap_or(defaults.metrics_enabled)
    })
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display
{
    match env_string(key) {
        None => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(|e| EnvError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
            value
        })
    }
}
