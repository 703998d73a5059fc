//! # Configuration Precedence
//!
//! Merges configuration from multiple sources with precedence rules.
//!
//! # Precedence Order
//! 1. Environment variables (highest priority)
//! 2. Configuration file
//! 3. Default values (lowest priority)
//!
//! A source only overrides a field when its value differs from the default,
//! so a partial file or a sparse environment never resets earlier values.

use std::fmt::Debug;
use std::path::Path;

use crate::config::{
    CircuitBreakerSettings, Config, GatewayConfig, ModelsConfig, ObservabilityConfig,
    RetrievalConfig, ServerConfig
};
use crate::file_loader::{ConfigFileError, load_from_file};
use crate::loader::{EnvError, load_from_env};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    File(#[from] ConfigFileError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors)
}

/// Load, merge and validate configuration.
///
/// ```rust,no_run
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = config::load(Some(Path::new("assistant.toml")))?;
///     println!("Listening on port {}", config.server.port);
///     Ok(())
/// }
/// ```
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let from_file = match path {
        Some(path) => load_from_file(path)?,
        None => Config::default()
    };
    let from_env = load_from_env()?;

    let config = merge_configs(Config::default(), from_file, "file", from_env, "env");
    crate::validation::validate(&config)?;
    Ok(config)
}

/// Merge configuration sources: env > file > defaults.
pub fn merge_configs(
    defaults: Config,
    file_config: Config,
    file_source_name: &str,
    env_config: Config,
    env_source_name: &str
) -> Config {
    let config = merge_with_logging(defaults, &file_config, file_source_name);
    merge_with_logging(config, &env_config, env_source_name)
}

fn merge_with_logging(mut base: Config, override_config: &Config, source_name: &str) -> Config {
    let mut changes = Vec::new();

    merge_server(&mut base.server, &override_config.server, &mut changes);
    merge_gateway(&mut base.gateway, &override_config.gateway, &mut changes);
    merge_models(&mut base.models, &override_config.models, &mut changes);
    merge_circuit_breaker(
        &mut base.circuit_breaker,
        &override_config.circuit_breaker,
        &mut changes
    );
    merge_retrieval(&mut base.retrieval, &override_config.retrieval, &mut changes);
    merge_observability(
        &mut base.observability,
        &override_config.observability,
        &mut changes
    );

    if !changes.is_empty() {
        tracing::info!("Configuration from {}: {:?}", source_name, changes);
    }

    base
}

/// Take `value` when it differs from both the default and the current base.
fn overlay<T>(base: &mut T, value: &T, default: &T, path: &str, changes: &mut Vec<String>)
where
    T: PartialEq + Clone + Debug
{
    if value != default && value != base {
        changes.push(format!("{path} = {value:?}"));
        base.clone_from(value);
    }
}

fn merge_server(base: &mut ServerConfig, other: &ServerConfig, changes: &mut Vec<String>) {
    let d = ServerConfig::default();
    overlay(&mut base.host, &other.host, &d.host, "server.host", changes);
    overlay(&mut base.port, &other.port, &d.port, "server.port", changes);
}

fn merge_gateway(base: &mut GatewayConfig, other: &GatewayConfig, changes: &mut Vec<String>) {
    let d = GatewayConfig::default();
    overlay(&mut base.base_url, &other.base_url, &d.base_url, "gateway.base_url", changes);
    if other.api_key.is_some() && other.api_key != base.api_key {
        changes.push("gateway.api_key = ***".to_string());
        base.api_key.clone_from(&other.api_key);
    }
    overlay(
        &mut base.timeout_secs,
        &other.timeout_secs,
        &d.timeout_secs,
        "gateway.timeout_secs",
        changes
    );
    overlay(
        &mut base.stream_timeout_secs,
        &other.stream_timeout_secs,
        &d.stream_timeout_secs,
        "gateway.stream_timeout_secs",
        changes
    );
    overlay(
        &mut base.stream_idle_timeout_secs,
        &other.stream_idle_timeout_secs,
        &d.stream_idle_timeout_secs,
        "gateway.stream_idle_timeout_secs",
        changes
    );
}

fn merge_models(base: &mut ModelsConfig, other: &ModelsConfig, changes: &mut Vec<String>) {
    let d = ModelsConfig::default();
    overlay(&mut base.chat_model, &other.chat_model, &d.chat_model, "models.chat_model", changes);
    overlay(
        &mut base.classifier_model,
        &other.classifier_model,
        &d.classifier_model,
        "models.classifier_model",
        changes
    );
    overlay(
        &mut base.explain_model,
        &other.explain_model,
        &d.explain_model,
        "models.explain_model",
        changes
    );
    overlay(
        &mut base.temperature,
        &other.temperature,
        &d.temperature,
        "models.temperature",
        changes
    );
    overlay(&mut base.max_tokens, &other.max_tokens, &d.max_tokens, "models.max_tokens", changes);
}

fn merge_circuit_breaker(
    base: &mut CircuitBreakerSettings,
    other: &CircuitBreakerSettings,
    changes: &mut Vec<String>
) {
    let d = CircuitBreakerSettings::default();
    overlay(
        &mut base.failure_threshold,
        &other.failure_threshold,
        &d.failure_threshold,
        "circuit_breaker.failure_threshold",
        changes
    );
    overlay(
        &mut base.reset_timeout_secs,
        &other.reset_timeout_secs,
        &d.reset_timeout_secs,
        "circuit_breaker.reset_timeout_secs",
        changes
    );
}

fn merge_retrieval(base: &mut RetrievalConfig, other: &RetrievalConfig, changes: &mut Vec<String>) {
    let d = RetrievalConfig::default();
    overlay(&mut base.enabled, &other.enabled, &d.enabled, "retrieval.enabled", changes);
    overlay(
        &mut base.service_url,
        &other.service_url,
        &d.service_url,
        "retrieval.service_url",
        changes
    );
    overlay(
        &mut base.embedding_model,
        &other.embedding_model,
        &d.embedding_model,
        "retrieval.embedding_model",
        changes
    );
    overlay(&mut base.top_k, &other.top_k, &d.top_k, "retrieval.top_k", changes);
    overlay(
        &mut base.min_similarity,
        &other.min_similarity,
        &d.min_similarity,
        "retrieval.min_similarity",
        changes
    );
}

fn merge_observability(
    base: &mut ObservabilityConfig,
    other: &ObservabilityConfig,
    changes: &mut Vec<String>
) {
    let d = ObservabilityConfig::default();
    overlay(
        &mut base.log_level,
        &other.log_level,
        &d.log_level,
        "observability.log_level",
        changes
    );
    overlay(
        &mut base.metrics_enabled,
        &other.metrics_enabled,
        &d.metrics_enabled,
        "observability.metrics_enabled",
        changes
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_merge_configs_precedence() {
        let file_config = Config {
            models: ModelsConfig {
                chat_model: "file/chat".to_string(),
                classifier_model: "file/classifier".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let env_config = Config {
            models: ModelsConfig {
                chat_model: "env/chat".to_string(),
                ..Default::default()
            },
            server: ServerConfig {
                port: 9999,
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = merge_configs(Config::default(), file_config, "file", env_config, "env");

        assert_eq!(merged.models.chat_model, "env/chat");
        assert_eq!(merged.models.classifier_model, "file/classifier");
        assert_eq!(merged.server.port, 9999);
        assert_eq!(merged.server.host, "0.0.0.0");
    }

    #[test]
    fn test_default_valued_source_does_not_reset() {
        let file_config = Config {
            retrieval: RetrievalConfig {
                top_k: 12,
                service_url: Some("http://chunks:9000".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = merge_configs(
            Config::default(),
            file_config,
            "file",
            Config::default(),
            "env"
        );

        assert_eq!(merged.retrieval.top_k, 12);
        assert!(merged.retrieval.is_active());
    }

    #[test]
    fn test_api_key_overlay() {
        let mut base = GatewayConfig::default();
        let other = GatewayConfig {
            api_key: Some("sk-env".to_string()),
            ..Default::default()
        };
        let mut changes = Vec::new();

        merge_gateway(&mut base, &other, &mut changes);

        assert_eq!(base.api_key.as_deref(), Some("sk-env"));
        assert_eq!(changes, vec!["gateway.api_key = ***".to_string()]);
    }

    #[test]
    #[serial]
    fn test_load_without_file_uses_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("assistant.toml");
        std::fs::write(&path, "[retrieval]\nmin_similarity = 1.5\n").unwrap();

        let result = load(Some(&path));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn test_load_env_overrides_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("assistant.yaml");
        std::fs::write(&path, "models:\n  chat_model: file/chat\n").unwrap();
        unsafe {
            std::env::set_var("RA_CHAT_MODEL", "env/chat");
        }

        let result = load(Some(&path));

        unsafe {
            std::env::remove_var("RA_CHAT_MODEL");
        }
        assert_eq!(result.unwrap().models.chat_model, "env/chat");
    }
}
