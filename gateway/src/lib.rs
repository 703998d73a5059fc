//! # Model Gateway
//!
//! Uniform access to the remote models behind an OpenAI-compatible gateway.
//!
//! - [`ModelGateway`]: `chat` (one completion plus usage) and `chat_stream`
//!   (finite, non-resumable sequence of text fragments)
//! - [`models`]: static per-model capability flags and pricing
//! - [`citations`]: normalisation of the two citation response shapes
//! - [`CircuitBreaker`]: failure-counting state machine wrapping every call

pub mod circuit_breaker;
pub mod citations;
pub mod client;
pub mod models;
mod sse;
pub mod telemetry;
pub mod types;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitState};
pub use citations::{Citation, CitationPayload, SearchResult, extract_citations};
pub use client::{HttpGateway, HttpGatewayConfig, ModelGateway};
pub use models::{
    ModelCapabilities, ModelDescriptor, has_web_search, supports_json_mode, supports_reasoning
};
pub use types::{ChunkStream, GatewayRequest, GatewayResponse, StreamChunk};
