//! # Report Assistant Core
//!
//! Shared types and collaborator traits for the report assistant.
//!
//! This crate provides:
//! - The conversation data model (messages, intents, pending edits)
//! - The typed streaming protocol events and non-streaming response body
//! - Traits for the external collaborators the assistant reads from
//!   (chunk retrieval, query embedding) and the injectable clock

pub mod traits;
pub mod types;

pub use traits::{ChunkRetriever, Clock, EmbeddingService, SystemClock};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ClassifiedIntent, Confidence, ConfidenceLevel,
    ContextChunk, ContextSource, DoneEvent, Embedding, PendingEdit, RelatedFactor,
    ResponseMetadata, Role, StreamEvent, UsageRecord
};
