//! # Report Assistant Errors
//!
//! Error taxonomy shared by every crate of the report assistant.
//!
//! - [`ValidationError`]: bad or missing request fields, surfaced as a 400
//!   before any model call is made
//! - [`GatewayError`]: upstream model call failures, counted by the circuit
//!   breaker and never retried within the same request
//! - [`CircuitOpenError`]: fail-fast rejection while a circuit is open
//! - [`ExtractionError`]: malformed structured edit blocks; degrades to an
//!   empty result and is never returned to callers of the router
//! - [`ClassificationError`]: classifier failures; degrades to the general
//!   intent and never aborts a request
//! - [`RetrievalError`]: embedding or chunk retrieval failures; degrades to the
//!   document summary

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Request validation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String }
}

impl ValidationError {
    pub fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string()
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into()
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field } | Self::InvalidField { field, .. } => field
        }
    }
}

/// Raised instead of invoking the wrapped operation while a circuit is open.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("Circuit '{circuit}' is open; next retry at {next_retry_at}")]
pub struct CircuitOpenError {
    pub circuit: String,
    pub next_retry_at: DateTime<Utc>
}

/// Model gateway errors
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Gateway transport error for {model}: {reason}")]
    Transport { model: String, reason: String },

    #[error("Gateway returned status {status} for {model}: {body}")]
    Status {
        model: String,
        status: u16,
        body: String
    },

    #[error("Gateway call to {model} timed out after {timeout_ms}ms")]
    Timeout { model: String, timeout_ms: u64 },

    #[error("Invalid gateway response from {model}: {reason}")]
    InvalidResponse { model: String, reason: String },

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    #[error("Gateway not configured: {reason}")]
    NotConfigured { reason: String }
}

impl GatewayError {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, GatewayError::CircuitOpen(_))
    }

    /// Stable machine-readable code used in logs, metrics and HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Transport { .. } => "GATEWAY_TRANSPORT",
            GatewayError::Status { .. } => "GATEWAY_STATUS",
            GatewayError::Timeout { .. } => "GATEWAY_TIMEOUT",
            GatewayError::InvalidResponse { .. } => "GATEWAY_INVALID_RESPONSE",
            GatewayError::CircuitOpen(_) => "CIRCUIT_OPEN",
            GatewayError::NotConfigured { .. } => "GATEWAY_NOT_CONFIGURED"
        }
    }
}

/// Structured edit block errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Malformed edit block: {reason}")]
    MalformedBlock { reason: String },

    #[error("Edit block is missing the isEdit marker")]
    MissingMarker,

    #[error("Edit block contains no usable edits")]
    NoUsableEdits
}

/// Intent classification errors
#[derive(Debug, Clone, Error)]
pub enum ClassificationError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Malformed classifier output: {reason}")]
    MalformedOutput { reason: String },

    #[error("Unknown intent label: {label}")]
    UnknownIntent { label: String }
}

/// Grounding retrieval errors
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Embedding failed: {reason}")]
    Embedding { reason: String },

    #[error("Chunk retrieval service failed: {reason}")]
    Service { reason: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::missing("message");
        assert_eq!(err.to_string(), "Missing required field: message");
        assert_eq!(err.field(), "message");

        let err = ValidationError::invalid("document", "must be an object");
        assert_eq!(err.to_string(), "Invalid field document: must be an object");
    }

    #[test]
    fn test_circuit_open_error_carries_name_and_retry_time() {
        let next = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let err = CircuitOpenError {
            circuit: "gateway".to_string(),
            next_retry_at: next
        };
        let message = err.to_string();
        assert!(message.contains("gateway"));
        assert!(message.contains("2026-01-02"));

        let gateway: GatewayError = err.into();
        assert!(gateway.is_circuit_open());
        assert_eq!(gateway.code(), "CIRCUIT_OPEN");
    }

    #[test]
    fn test_gateway_error_codes() {
        let err = GatewayError::Status {
            model: "m".to_string(),
            status: 502,
            body: "bad gateway".to_string()
        };
        assert_eq!(err.code(), "GATEWAY_STATUS");
        assert!(!err.is_circuit_open());
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_classification_error_wraps_gateway() {
        let err: ClassificationError = GatewayError::Timeout {
            model: "m".to_string(),
            timeout_ms: 10
        }
        .into();
        assert!(err.to_string().contains("timed out"));
    }
}
