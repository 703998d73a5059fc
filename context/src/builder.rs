use std::sync::Arc;

use metrics::counter;
use report_core::{ChunkRetriever, ContextChunk, ContextSource, EmbeddingService};
use serde_json::Value;
use tracing::{debug, warn};

use crate::summary::summarize_document;

#[derive(Debug, Clone)]
pub struct ContextBuilderConfig {
    /// When false every request takes the summary path
    pub enabled: bool,
    pub top_k: usize,
    pub min_similarity: f32
}

impl Default for ContextBuilderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: 5,
            min_similarity: 0.65
        }
    }
}

/// Grounding text plus a record of how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltContext {
    pub text: String,
    pub source: ContextSource,
    /// Retrieved chunks, best first. Empty on the summary path.
    pub chunks: Vec<ContextChunk>,
    /// Query embedding cost, present whenever an embedding was computed.
    pub rag_cost: Option<f64>
}

impl BuiltContext {
    pub fn summary(document: &Value) -> Self {
        Self {
            text: summarize_document(document),
            source: ContextSource::Summary,
            chunks: Vec::new(),
            rag_cost: None
        }
    }

    pub fn is_rag(&self) -> bool {
        self.source == ContextSource::Rag
    }

    /// `section.fieldPath` labels of the retrieved chunks.
    pub fn sources(&self) -> Vec<String> {
        self.chunks.iter().map(ContextChunk::provenance).collect()
    }

    pub fn best_similarity(&self) -> Option<f32> {
        self.chunks.iter().map(|c| c.similarity).reduce(f32::max)
    }
}

pub struct ContextBuilder {
    embedder: Option<Arc<dyn EmbeddingService>>,
    retriever: Option<Arc<dyn ChunkRetriever>>,
    config: ContextBuilderConfig
}

impl ContextBuilder {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        retriever: Arc<dyn ChunkRetriever>,
        config: ContextBuilderConfig
    ) -> Self {
        Self {
            embedder: Some(embedder),
            retriever: Some(retriever),
            config
        }
    }

    /// Builder with no retrieval collaborators; always summarises.
    pub fn summary_only() -> Self {
        Self {
            embedder: None,
            retriever: None,
            config: ContextBuilderConfig {
                enabled: false,
                ..ContextBuilderConfig::default()
            }
        }
    }

    pub fn config(&self) -> &ContextBuilderConfig {
        &self.config
    }

    /// Builds grounding context for `query`. Never fails: every retrieval
    /// problem degrades to the document summary.
    pub async fn build(&self, query: &str, document_id: Option<&str>, document: &Value) -> BuiltContext {
        let context = match (document_id, self.collaborators()) {
            (Some(document_id), Some((embedder, retriever))) => {
                self.retrieve(query, document_id, document, embedder, retriever)
                    .await
            }
            _ => BuiltContext::summary(document)
        };

        counter!("chat_context_source_total", "source" => context.source.to_string())
            .increment(1);
        context
    }

    fn collaborators(&self) -> Option<(&Arc<dyn EmbeddingService>, &Arc<dyn ChunkRetriever>)> {
        if !self.config.enabled {
            return None;
        }
        Some((self.embedder.as_ref()?, self.retriever.as_ref()?))
    }

    async fn retrieve(
        &self,
        query: &str,
        document_id: &str,
        document: &Value,
        embedder: &Arc<dyn EmbeddingService>,
        retriever: &Arc<dyn ChunkRetriever>
    ) -> BuiltContext {
        let embedding = match embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(document_id, error = %e, "Query embedding failed, using document summary");
                return BuiltContext::summary(document);
            }
        };
        let rag_cost = Some(embedding.usage.cost);

        let chunks = match retriever
            .retrieve(
                document_id,
                &embedding.vector,
                self.config.top_k,
                self.config.min_similarity
            )
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(document_id, error = %e, "Chunk retrieval failed, using document summary");
                return BuiltContext {
                    rag_cost,
                    ..BuiltContext::summary(document)
                };
            }
        };

        if chunks.is_empty() {
            debug!(document_id, "No chunks above similarity threshold, using document summary");
            return BuiltContext {
                rag_cost,
                ..BuiltContext::summary(document)
            };
        }

        debug!(document_id, chunks = chunks.len(), "Built retrieval context");
        BuiltContext {
            text: format_chunks(&chunks),
            source: ContextSource::Rag,
            chunks,
            rag_cost
        }
    }
}

/// Concatenates chunks under `[section › fieldPath] (similarity 0.87)` headers.
pub fn format_chunks(chunks: &[ContextChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            let location = if chunk.field_path.is_empty() {
                chunk.section.clone()
            } else {
                format!("{} › {}", chunk.section, chunk.field_path)
            };
            format!(
                "[{}] (similarity {:.2})\n{}",
                location, chunk.similarity, chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
