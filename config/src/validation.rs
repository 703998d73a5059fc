//! # Configuration Validation
//!
//! Provides validation for all configuration structures using the `validator` crate.

use crate::config::Config;
use validator::Validate;

/// Validate configuration structure.
///
/// ## Validation Rules
/// - `server.port`: 1-65535
/// - `gateway.timeout_secs`, `gateway.stream_timeout_secs`,
///   `gateway.stream_idle_timeout_secs`: 1-600
/// - model ids: non-empty
/// - `models.temperature`: 0.0-2.0
/// - `circuit_breaker.failure_threshold`: at least 1
/// - `retrieval.top_k`: 1-50
/// - `retrieval.min_similarity`: greater than 0, at most 1
/// - `observability.log_level`: one of trace, debug, info, warn, error
pub fn validate(config: &Config) -> Result<(), validator::ValidationErrors> {
    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_zero_failure_threshold() {
        let mut config = Config::default();
        config.circuit_breaker.failure_threshold = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_min_similarity_bounds() {
        let mut config = Config::default();
        config.retrieval.min_similarity = 0.0;
        assert!(validate(&config).is_err());

        config.retrieval.min_similarity = 1.0;
        assert!(validate(&config).is_ok());

        config.retrieval.min_similarity = 1.01;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_top_k_range() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(validate(&config).is_err());

        config.retrieval.top_k = 51;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_temperature_range() {
        let mut config = Config::default();
        config.models.temperature = 2.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_empty_model_id() {
        let mut config = Config::default();
        config.models.classifier_model = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.observability.log_level = "verbose".to_string();

        let errors = validate(&config).unwrap_err();
        assert!(errors.errors().contains_key("observability"));
    }
}
