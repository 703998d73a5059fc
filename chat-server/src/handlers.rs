//! HTTP request handlers for the chat server.

use std::convert::Infallible;
use std::sync::Arc;

use assistant::{ChatReply, encode_event};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse}
    }
};
use futures_util::stream::{self, Stream};
use gateway::{CircuitBreakerState, CircuitState};
use report_core::{ChatRequest, StreamEvent};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::ApiError;
use crate::state::AppState;

const ENCODING_FAILURE: &str = r#"{"type":"error","error":"Failed to encode response event"}"#;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Names of circuits that are currently failing fast
    #[serde(rename = "openCircuits")]
    pub open_circuits: Vec<String>
}

/// Health check endpoint.
///
/// Always 200 while the process serves requests; an open circuit reports
/// `degraded` because chat turns still complete with an apology.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let open_circuits: Vec<String> = state
        .assistant
        .gateway()
        .circuits()
        .into_iter()
        .filter(|c| c.state == CircuitState::Open)
        .map(|c| c.name)
        .collect();

    let status = if open_circuits.is_empty() {
        "healthy"
    } else {
        "degraded"
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            open_circuits
        })
    )
}

/// Prometheus metrics in text exposition format.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::Disabled("Metrics".to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render()
    )
        .into_response())
}

/// GET /api/circuits
pub async fn circuits(State(state): State<Arc<AppState>>) -> Json<Vec<CircuitBreakerState>> {
    Json(state.assistant.gateway().circuits())
}

/// POST /api/chat
///
/// Validation failures are answered with 400 before any model call. Every
/// other outcome, including generation failures, is delivered in-band: as
/// `error` and `done` events on a stream, or inside the JSON body.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    tracing::debug!(
        message_len = request.message.len(),
        history = request.history.len(),
        stream = request.stream,
        has_document_id = request.document_id().is_some(),
        "Chat request received"
    );

    match state.assistant.handle(request).await? {
        ChatReply::Stream(rx) => Ok(Sse::new(event_stream(rx))
            .keep_alive(KeepAlive::default())
            .into_response()),
        ChatReply::Json(body) => Ok(Json(*body).into_response())
    }
}

/// One `data: <json>` frame per protocol event, ending when the producer
/// drops its sender after `done`.
fn event_stream(rx: mpsc::Receiver<StreamEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let data = encode_event(&event).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to encode stream event");
            ENCODING_FAILURE.to_string()
        });
        Some((Ok(Event::default().data(data)), rx))
    })
}
