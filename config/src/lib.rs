//! # Configuration System
//!
//! Centralized configuration management for the report assistant.
//!
//! This crate provides:
//! - Configuration structures for the server, gateway, models, circuit
//!   breaker, retrieval and observability
//! - Environment variable loading (`RA_*`)
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (env > file > defaults)
//! - Configuration validation

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;
pub mod validation;

pub use config::{
    CircuitBreakerSettings, Config, GatewayConfig, ModelsConfig, ObservabilityConfig,
    RetrievalConfig, ServerConfig
};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::{EnvError, load_from_env};
pub use precedence::{ConfigError, load, merge_configs};
pub use validation::validate;
pub use validator::Validate;
