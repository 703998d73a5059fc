//! # Configuration File Loading
//!
//! Loads configuration from TOML or YAML files.
//!
//! Supports automatic format detection based on file extension. Every
//! section is optional; omitted fields keep their defaults.

use crate::config::Config;
use std::path::Path;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String)
}

/// Load configuration from a TOML file.
///
/// ```rust,no_run
/// use config::load_from_toml;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_toml(Path::new("assistant.toml"))?;
///     println!("Chat model: {}", config.models.chat_model);
///     Ok(())
/// }
/// ```
pub fn load_from_toml(path: &Path) -> Result<Config, ConfigFileError> {
    let contents = read(path)?;
    toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))
}

/// Load configuration from a YAML file.
pub fn load_from_yaml(path: &Path) -> Result<Config, ConfigFileError> {
    let contents = read(path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))
}

/// Load configuration from file, detecting the format from its extension
/// (`.toml`, `.yaml`, `.yml`).
pub fn load_from_file(path: &Path) -> Result<Config, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string()))
    }
}

fn read(path: &Path) -> Result<String, ConfigFileError> {
    std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "assistant.toml",
            r#"
[server]
port = 9000

[gateway]
base_url = "http://gateway.local/v1"
timeout_secs = 30

[models]
chat_model = "openai/gpt-4o"
temperature = 0.2

[retrieval]
service_url = "http://chunks:9000"
top_k = 8

[observability]
log_level = "debug"
"#
        );

        let config = load_from_toml(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.gateway.base_url, "http://gateway.local/v1");
        assert_eq!(config.gateway.timeout_secs, 30);
        assert_eq!(config.gateway.stream_timeout_secs, 120);
        assert_eq!(config.models.chat_model, "openai/gpt-4o");
        assert_eq!(config.models.temperature, 0.2);
        assert_eq!(config.retrieval.top_k, 8);
        assert!(config.retrieval.is_active());
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_load_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "assistant.yaml",
            r"
circuit_breaker:
  failure_threshold: 3
  reset_timeout_secs: 10
retrieval:
  enabled: false
"
        );

        let config = load_from_yaml(&path).unwrap();
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.reset_timeout_secs, 10);
        assert!(!config.retrieval.enabled);
        assert_eq!(config.models, crate::config::ModelsConfig::default());
    }

    #[test]
    fn test_load_from_file_detects_format() {
        let dir = TempDir::new().unwrap();
        let toml_path = write(&dir, "a.toml", "[server]\nhost = \"127.0.0.1\"\n");
        let yml_path = write(&dir, "b.yml", "server:\n  host: 127.0.0.2\n");

        assert_eq!(load_from_file(&toml_path).unwrap().server.host, "127.0.0.1");
        assert_eq!(load_from_file(&yml_path).unwrap().server.host, "127.0.0.2");
    }

    #[test]
    fn test_load_from_file_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "assistant.json", "{}");

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_from_file_no_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "assistant", "");

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::NoExtension)));
    }

    #[test]
    fn test_load_from_toml_invalid() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.toml", "[invalid\n");

        let result = load_from_toml(&path);
        assert!(matches!(result, Err(ConfigFileError::TomlParse(_))));
    }

    #[test]
    fn test_load_from_yaml_invalid() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.yaml", "invalid: [unmatched\n");

        let result = load_from_yaml(&path);
        assert!(matches!(result, Err(ConfigFileError::YamlParse(_))));
    }

    #[test]
    fn test_load_from_toml_not_found() {
        let result = load_from_toml(Path::new("/nonexistent/path/assistant.toml"));
        assert!(matches!(result, Err(ConfigFileError::FileNotFound(_))));
    }
}
