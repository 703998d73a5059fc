use std::time::Duration;

use async_trait::async_trait;
use errors::RetrievalError;
use report_core::{ChunkRetriever, ContextChunk};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct HttpChunkRetrieverConfig {
    pub service_url: String,
    pub timeout: Duration
}

/// [`ChunkRetriever`] backed by an external similarity-search service.
///
/// Issues `POST {service_url}/search` and expects `{ "chunks": [...] }`.
pub struct HttpChunkRetriever {
    http: reqwest::Client,
    config: HttpChunkRetrieverConfig
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    document_id: &'a str,
    embedding: &'a [f32],
    top_k: usize,
    min_similarity: f32
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    chunks: Vec<ContextChunk>
}

impl HttpChunkRetriever {
    pub fn new(config: HttpChunkRetrieverConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config
        }
    }
}

#[async_trait]
impl ChunkRetriever for HttpChunkRetriever {
    async fn retrieve(
        &self,
        document_id: &str,
        query_embedding: &[f32],
        top_k: usize,
        min_similarity: f32
    ) -> Result<Vec<ContextChunk>, RetrievalError> {
        let url = format!("{}/search", self.config.service_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .timeout(self.config.timeout)
            .json(&SearchRequest {
                document_id,
                embedding: query_embedding,
                top_k,
                min_similarity
            })
            .send()
            .await
            .map_err(|e| RetrievalError::Service {
                reason: e.to_string()
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Service {
                reason: format!("retrieval service returned {}", status)
            });
        }

        let body: SearchResponse = response.json().await.map_err(|e| RetrievalError::Service {
            reason: format!("invalid retrieval response: {}", e)
        })?;

        // The service is trusted for ordering but not for the threshold.
        let mut chunks: Vec<ContextChunk> = body
            .chunks
            .into_iter()
            .filter(|c| c.similarity >= min_similarity)
            .collect();
        chunks.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        chunks.truncate(top_k);
        Ok(chunks)
    }
}
