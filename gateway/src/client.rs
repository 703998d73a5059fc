//! # Gateway client
//!
//! [`ModelGateway`] is the seam the assistant talks through. [`HttpGateway`]
//! implements it over an OpenAI-compatible HTTP API (chat completions,
//! streamed completions and embeddings), with every call executed through a
//! [`CircuitBreaker`] and bounded by a per-call timeout. Embeddings only feed
//! retrieval, so they trip a breaker of their own and never the one that
//! guards generation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use errors::{GatewayError, RetrievalError};
use report_core::{ChatMessage, Embedding, EmbeddingService, UsageRecord};
use serde::{Deserialize, Serialize};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState};
use crate::citations::{CitationPayload, SearchResult};
use crate::models;
use crate::sse;
use crate::telemetry::GatewayTelemetry;
use crate::types::{ChunkStream, GatewayRequest, GatewayResponse};

#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// One non-streamed completion with usage and cost.
    async fn chat(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError>;

    /// Streamed completion. Failures establishing the stream are returned
    /// here; failures while reading surface as stream items.
    async fn chat_stream(&self, request: GatewayRequest) -> Result<ChunkStream, GatewayError>;

    /// Breakers guarding this gateway, for diagnostics.
    fn circuits(&self) -> Vec<CircuitBreakerState> {
        Vec::new()
    }
}

#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Base URL of the OpenAI-compatible API, e.g. `https://openrouter.ai/api/v1`
    pub base_url: String,
    pub api_key: Option<String>,
    /// Applied when a request carries no timeout of its own
    pub default_timeout: Duration,
    /// Bound on establishing a streamed completion
    pub stream_timeout: Duration,
    pub embedding_model: String,
    pub circuit_breaker: CircuitBreakerConfig
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            default_timeout: Duration::from_secs(60),
            stream_timeout: Duration::from_secs(120),
            embedding_model: "openai/text-embedding-3-small".to_string(),
            circuit_breaker: CircuitBreakerConfig::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<serde_json::Value>
}

#[derive(Debug, Deserialize)]
struct ApiChatResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    citations: Option<Vec<String>>,
    #[serde(default)]
    search_results: Option<Vec<SearchResult>>
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: Option<u64>,
    #[serde(default)]
    cost: Option<f64>
}

impl ApiUsage {
    /// Provider-reported cost wins; otherwise the registry price applies.
    pub(crate) fn into_record(self, model: &str) -> UsageRecord {
        let cost = self.cost.unwrap_or_else(|| {
            models::estimate_cost(model, self.prompt_tokens, self.completion_tokens)
        });
        UsageRecord {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self
                .total_tokens
                .unwrap_or(self.prompt_tokens + self.completion_tokens),
            cost
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str
}

#[derive(Debug, Deserialize)]
struct ApiEmbeddingResponse {
    #[serde(default)]
    data: Vec<ApiEmbeddingData>,
    #[serde(default)]
    usage: Option<ApiUsage>
}

#[derive(Debug, Deserialize)]
struct ApiEmbeddingData {
    embedding: Vec<f32>
}

pub struct HttpGateway {
    http: reqwest::Client,
    config: HttpGatewayConfig,
    breaker: Arc<CircuitBreaker>,
    embedding_breaker: Arc<CircuitBreaker>
}

impl HttpGateway {
    pub fn new(config: HttpGatewayConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            "model-gateway",
            config.circuit_breaker.clone()
        ));
        Self::with_breaker(config, breaker)
    }

    /// Shares an externally owned generation breaker, e.g. one built with a
    /// test clock.
    pub fn with_breaker(config: HttpGatewayConfig, breaker: Arc<CircuitBreaker>) -> Self {
        let embedding_breaker = Arc::new(CircuitBreaker::new(
            "embedding-gateway",
            config.circuit_breaker.clone()
        ));
        Self {
            http: reqwest::Client::new(),
            config,
            breaker,
            embedding_breaker
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn embedding_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.embedding_breaker
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.post(self.url(path));
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder
        }
    }

    fn body<'a>(request: &'a GatewayRequest, stream: bool) -> ApiChatRequest<'a> {
        let json = request.json_mode && models::supports_json_mode(&request.model);
        ApiChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
            response_format: json.then(|| serde_json::json!({"type": "json_object"})),
            usage: stream.then(|| serde_json::json!({"include": true}))
        }
    }

    /// Sends a request and rejects non-success statuses.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        model: &str
    ) -> Result<reqwest::Response, GatewayError> {
        let response = builder.send().await.map_err(|e| transport(model, &e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            model: model.to_string(),
            status: status.as_u16(),
            body: truncate(&body, 500)
        })
    }

    async fn chat_once(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let model = request.model.as_str();
        let response = self
            .send(self.post("chat/completions").json(&Self::body(request, false)), model)
            .await?;
        let api: ApiChatResponse = response.json().await.map_err(|e| invalid(model, &e))?;

        let content = api
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GatewayError::InvalidResponse {
                model: model.to_string(),
                reason: "response contained no choices".to_string()
            })?;

        Ok(GatewayResponse {
            content,
            model: model.to_string(),
            usage: api.usage.unwrap_or_default().into_record(model),
            citations: CitationPayload::from_raw(api.search_results, api.citations)
        })
    }

    /// Embeds `text` with `model`.
    pub async fn embed_with(&self, model: &str, text: &str) -> Result<Embedding, GatewayError> {
        let timeout = self.config.default_timeout;
        self.embedding_breaker
            .execute(|| async {
                let call = async {
                    let response = self
                        .send(
                            self.post("embeddings")
                                .json(&ApiEmbeddingRequest { model, input: text }),
                            model
                        )
                        .await?;
                    let api: ApiEmbeddingResponse =
                        response.json().await.map_err(|e| invalid(model, &e))?;
                    let vector = api
                        .data
                        .into_iter()
                        .next()
                        .map(|d| d.embedding)
                        .ok_or_else(|| GatewayError::InvalidResponse {
                            model: model.to_string(),
                            reason: "no embedding returned".to_string()
                        })?;
                    Ok(Embedding {
                        vector,
                        usage: api.usage.unwrap_or_default().into_record(model)
                    })
                };
                with_timeout(model, timeout, call).await
            })
            .await
    }
}

#[async_trait]
impl ModelGateway for HttpGateway {
    async fn chat(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let timeout = request.timeout.unwrap_or(self.config.default_timeout);
        let started = Instant::now();

        let result = self
            .breaker
            .execute(|| with_timeout(&request.model, timeout, self.chat_once(&request)))
            .await;

        GatewayTelemetry::record_latency(&request.model, "chat", started.elapsed().as_millis() as f64);
        match &result {
            Ok(response) => {
                GatewayTelemetry::record_call(&request.model, "chat", "ok");
                tracing::debug!(
                    model = %request.model,
                    total_tokens = response.usage.total_tokens,
                    cost = response.usage.cost,
                    "Gateway chat completed"
                );
            }
            Err(e) => {
                GatewayTelemetry::record_call(&request.model, "chat", e.code());
                tracing::warn!(model = %request.model, error = %e, "Gateway chat failed");
            }
        }
        result
    }

    async fn chat_stream(&self, request: GatewayRequest) -> Result<ChunkStream, GatewayError> {
        let timeout = request.timeout.unwrap_or(self.config.stream_timeout);
        let model = request.model.clone();

        let response = self
            .breaker
            .execute(|| {
                with_timeout(
                    &model,
                    timeout,
                    self.send(
                        self.post("chat/completions")
                            .json(&Self::body(&request, true)),
                        &model
                    )
                )
            })
            .await;

        match response {
            Ok(response) => {
                GatewayTelemetry::record_call(&model, "stream", "ok");
                Ok(sse::decode(Box::pin(response.bytes_stream()), model))
            }
            Err(e) => {
                GatewayTelemetry::record_call(&model, "stream", e.code());
                tracing::warn!(model = %model, error = %e, "Gateway stream failed to start");
                Err(e)
            }
        }
    }

    fn circuits(&self) -> Vec<CircuitBreakerState> {
        vec![self.breaker.snapshot(), self.embedding_breaker.snapshot()]
    }
}

#[async_trait]
impl EmbeddingService for HttpGateway {
    async fn embed(&self, text: &str) -> Result<Embedding, RetrievalError> {
        let model = self.config.embedding_model.clone();
        Ok(self.embed_with(&model, text).await?)
    }
}

async fn with_timeout<T>(
    model: &str,
    timeout: Duration,
    call: impl std::future::Future<Output = Result<T, GatewayError>>
) -> Result<T, GatewayError> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| GatewayError::Timeout {
            model: model.to_string(),
            timeout_ms: timeout.as_millis() as u64
        })?
}

fn transport(model: &str, e: &reqwest::Error) -> GatewayError {
    GatewayError::Transport {
        model: model.to_string(),
        reason: e.to_string()
    }
}

fn invalid(model: &str, e: &reqwest::Error) -> GatewayError {
    GatewayError::InvalidResponse {
        model: model.to_string(),
        reason: e.to_string()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string()
    }
}
