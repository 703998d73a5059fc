//! Error types for the chat server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response}
};
use errors::{GatewayError, ValidationError};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request failed boundary validation; no model was called.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Request body could not be decoded.
    #[error("Malformed request body: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A requested facility is switched off by configuration.
    #[error("Not enabled: {0}")]
    Disabled(String),

    #[error("Internal error: {0}")]
    Internal(String)
}

/// Error response body for HTTP endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Validation(e) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                e.to_string(),
                Some(e.field().to_string())
            ),
            Self::BadRequest(reason) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "Malformed request body".to_string(),
                Some(reason.clone())
            ),
            Self::Gateway(e) if e.is_circuit_open() => (
                StatusCode::SERVICE_UNAVAILABLE,
                e.code(),
                "The assistant is temporarily unavailable".to_string(),
                Some(e.to_string())
            ),
            Self::Gateway(e) => {
                tracing::error!(error = %e, code = e.code(), "Gateway error");
                (
                    StatusCode::BAD_GATEWAY,
                    e.code(),
                    "The model gateway failed".to_string(),
                    Some(e.to_string())
                )
            }
            Self::Disabled(what) => (
                StatusCode::NOT_FOUND,
                "NOT_ENABLED",
                format!("{what} is not enabled"),
                None
            ),
            Self::Internal(msg) => {
                tracing::error!(message = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    Some(msg.clone())
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errors::CircuitOpenError;

    fn open_error() -> GatewayError {
        CircuitOpenError {
            circuit: "model-gateway".to_string(),
            next_retry_at: "2026-01-01T00:00:00Z".parse().unwrap()
        }
        .into()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_is_bad_request() {
        let response = ApiError::from(ValidationError::missing("message")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["details"], "message");
    }

    #[tokio::test]
    async fn test_circuit_open_is_service_unavailable() {
        let response = ApiError::from(open_error()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["code"], "CIRCUIT_OPEN");
    }

    #[tokio::test]
    async fn test_gateway_failure_is_bad_gateway() {
        let err = GatewayError::Status {
            model: "m".to_string(),
            status: 500,
            body: "boom".to_string()
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["code"], "GATEWAY_STATUS");
    }

    #[tokio::test]
    async fn test_internal_error_is_server_error() {
        let response = ApiError::Internal("lock poisoned".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "An internal error occurred");
        assert_eq!(body["details"], "lock poisoned");
    }

    #[test]
    fn test_error_response_skips_empty_details() {
        let resp = ErrorResponse {
            error: "Metrics is not enabled".to_string(),
            code: "NOT_ENABLED".to_string(),
            details: None
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("details"));
    }
}
