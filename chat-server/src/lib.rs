//! # Report Assistant Chat Server
//!
//! HTTP surface for conversational questions, explanations and edit
//! proposals about a generated research report.
//!
//! ## Endpoints
//!
//! - `POST /api/chat` - Chat turn; `text/event-stream` of protocol events, or
//!   a single JSON body for explanations, placeholders and `stream: false`
//! - `GET /api/circuits` - Circuit breaker snapshots
//! - `GET /health` - Health check endpoint
//! - `GET /metrics` - Prometheus metrics endpoint

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use server::ChatServer;
pub use state::{AppState, build_assistant};
