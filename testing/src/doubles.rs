use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use errors::RetrievalError;
use parking_lot::Mutex;
use report_core::{ChunkRetriever, ContextChunk, Embedding, EmbeddingService, UsageRecord};

/// Retriever returning a fixed chunk set, filtered and truncated like a
/// real similarity search would.
pub struct StaticRetriever {
    chunks: Vec<ContextChunk>,
    calls: AtomicUsize,
    last_document_id: Mutex<Option<String>>
}

impl StaticRetriever {
    pub fn new(chunks: Vec<ContextChunk>) -> Self {
        Self {
            chunks,
            calls: AtomicUsize::new(0),
            last_document_id: Mutex::new(None)
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_document_id(&self) -> Option<String> {
        self.last_document_id.lock().clone()
    }
}

#[async_trait]
impl ChunkRetriever for StaticRetriever {
    async fn retrieve(
        &self,
        document_id: &str,
        _query_embedding: &[f32],
        top_k: usize,
        min_similarity: f32
    ) -> Result<Vec<ContextChunk>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_document_id.lock() = Some(document_id.to_string());

        let mut matches: Vec<ContextChunk> = self
            .chunks
            .iter()
            .filter(|c| c.similarity >= min_similarity)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(top_k);
        Ok(matches)
    }
}

/// Retriever that always fails, for exercising the summary fallback.
#[derive(Default)]
pub struct FailingRetriever {
    calls: AtomicUsize
}

impl FailingRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkRetriever for FailingRetriever {
    async fn retrieve(
        &self,
        document_id: &str,
        _query_embedding: &[f32],
        _top_k: usize,
        _min_similarity: f32
    ) -> Result<Vec<ContextChunk>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(document_id, "FailingRetriever rejecting request");
        Err(RetrievalError::Service {
            reason: "vector store unavailable".to_string()
        })
    }
}

/// Embedder producing a fixed-size vector with a fixed cost.
pub struct StaticEmbedder {
    dimension: usize,
    cost: f64,
    fail: bool,
    calls: AtomicUsize
}

impl StaticEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            cost: 0.00002,
            fail: false,
            calls: AtomicUsize::new(0)
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticEmbedder {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait]
impl EmbeddingService for StaticEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RetrievalError::Embedding {
                reason: "embedding model unavailable".to_string()
            });
        }
        let tokens = text.split_whitespace().count() as u64;
        Ok(Embedding {
            vector: vec![0.1; self.dimension],
            usage: UsageRecord::new(tokens, 0, self.cost)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_chunks;

    #[tokio::test]
    async fn test_static_retriever_applies_threshold_and_top_k() {
        let retriever = StaticRetriever::new(sample_chunks());
        let chunks = retriever.retrieve("doc-1", &[0.1], 1, 0.8).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].field_path, "statement");
        assert_eq!(retriever.last_document_id().as_deref(), Some("doc-1"));
    }

    #[tokio::test]
    async fn test_failing_retriever_counts_calls() {
        let retriever = FailingRetriever::new();
        assert!(retriever.retrieve("doc-1", &[], 5, 0.5).await.is_err());
        assert_eq!(retriever.calls(), 1);
    }

    #[tokio::test]
    async fn test_static_embedder_cost() {
        let embedder = StaticEmbedder::new(4).with_cost(0.5);
        let embedding = embedder.embed("two words").await.unwrap();
        assert_eq!(embedding.vector.len(), 4);
        assert_eq!(embedding.usage.cost, 0.5);
        assert!(StaticEmbedder::failing().embed("x").await.is_err());
    }
}
