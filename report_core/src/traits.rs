//! Collaborator traits consumed by the report assistant.
//!
//! Chunk storage, embedding generation and time are owned outside the
//! assistant; it only reads through these seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use errors::RetrievalError;

use crate::types::{ContextChunk, Embedding};

/// Similarity search over previously indexed document chunks.
#[async_trait]
pub trait ChunkRetriever: Send + Sync {
    /// Returns at most `top_k` chunks of `document_id` whose similarity to
    /// `query_embedding` is at least `min_similarity`, best first.
    async fn retrieve(
        &self,
        document_id: &str,
        query_embedding: &[f32],
        top_k: usize,
        min_similarity: f32
    ) -> Result<Vec<ContextChunk>, RetrievalError>;
}

/// Query embedding generation.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, RetrievalError>;
}

/// Time source, injectable so resilience timing can be driven by tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
