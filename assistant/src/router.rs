//! Per-intent response routing.
//!
//! [`ReportAssistant::handle`] validates the request, classifies the
//! message and dispatches on the intent:
//!
//! - Question / General: plain answer over the built context, streamed
//! - Edit: prose streamed, then the edit block extracted from the full text
//! - Explain: always a single structured JSON response
//! - Regenerate: canned guidance, flagged as a placeholder
//!
//! Streams are produced by a spawned task that owns an [`EventWriter`] and
//! always finishes with exactly one `done` event, including after a
//! generation failure or a panic.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use context::{BuiltContext, ContextBuilder};
use errors::{GatewayError, ValidationError};
use futures_util::{FutureExt, StreamExt};
use gateway::{GatewayRequest, ModelGateway, StreamChunk};
use report_core::{
    ChatRequest, ChatResponse, ClassifiedIntent, Confidence, ConfidenceLevel, DoneEvent,
    ResponseMetadata, StreamEvent, UsageRecord
};
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::classifier::{Classification, IntentClassifier};
use crate::confidence;
use crate::explain::{ExplainHandler, ExplainTarget};
use crate::extractor::{MARKER, extract_edits, is_edit_fence, opens_bare_block};
use crate::prompts;
use crate::protocol::{EventWriter, event_channel};
use crate::telemetry::ChatTelemetry;

const APOLOGY: &str =
    "I'm sorry, I couldn't complete that request right now. Please try again in a moment.";
const UNAVAILABLE: &str =
    "The assistant is temporarily unavailable. Please try again in a minute.";
const INTERRUPTED: &str = "Sorry, the response was interrupted before it finished.";
const EDIT_UNREADABLE: &str =
    "The proposed edit could not be read, so no changes were prepared. Please rephrase the request.";

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub chat_model: String,
    pub classifier_model: String,
    pub explain_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Most recent history messages included in generation prompts
    pub history_limit: usize,
    /// Per-call generation timeout; the gateway default applies when unset
    pub generation_timeout: Option<Duration>,
    /// Longest wait for the next fragment of an open stream
    pub stream_idle_timeout: Duration
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            chat_model: "anthropic/claude-sonnet-4".to_string(),
            classifier_model: "openai/gpt-4o-mini".to_string(),
            explain_model: "anthropic/claude-sonnet-4".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            history_limit: 10,
            generation_timeout: None,
            stream_idle_timeout: Duration::from_secs(30)
        }
    }
}

/// How a routed request is answered.
#[derive(Debug)]
pub enum ChatReply {
    /// Protocol events; the last one received is always `done`.
    Stream(mpsc::Receiver<StreamEvent>),
    Json(Box<ChatResponse>)
}

/// Generation paths that share the answer pipeline.
#[derive(Debug, Clone)]
enum Generation {
    Answer,
    Edit {
        section: String,
        field: Option<String>,
        desired_change: String
    }
}

impl Generation {
    fn is_edit(&self) -> bool {
        matches!(self, Generation::Edit { .. })
    }
}

/// One classified request in flight.
struct Turn {
    id: Uuid,
    request: ChatRequest,
    classification: Classification,
    started: Instant
}

impl Turn {
    fn intent(&self) -> &'static str {
        self.classification.intent.kind()
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn metadata(&self) -> ResponseMetadata {
        ResponseMetadata {
            processing_time: self.elapsed_ms(),
            classification_cost: self.classification.usage.cost,
            classification_tokens: self.classification.usage.total_tokens,
            intent_type: self.intent().to_string(),
            total_cost: self.classification.usage.cost,
            ..ResponseMetadata::default()
        }
    }
}

struct Inner {
    gateway: Arc<dyn ModelGateway>,
    classifier: IntentClassifier,
    explainer: ExplainHandler,
    context: ContextBuilder,
    config: AssistantConfig
}

/// Entry point for chat requests about a report document.
#[derive(Clone)]
pub struct ReportAssistant {
    inner: Arc<Inner>
}

impl ReportAssistant {
    pub fn new(gateway: Arc<dyn ModelGateway>, context: ContextBuilder, config: AssistantConfig) -> Self {
        let classifier = IntentClassifier::new(gateway.clone(), config.classifier_model.clone());
        let explainer =
            ExplainHandler::new(gateway.clone(), config.explain_model.clone(), config.max_tokens);
        Self {
            inner: Arc::new(Inner {
                gateway,
                classifier,
                explainer,
                context,
                config
            })
        }
    }

    pub fn gateway(&self) -> &Arc<dyn ModelGateway> {
        &self.inner.gateway
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.inner.config
    }

    /// Routes one request. Only boundary validation fails; every later
    /// failure is reported inside the reply.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply, ValidationError> {
        request.validate()?;
        let started = Instant::now();
        let classification = self.inner.classifier.classify(&request.message).await;
        let turn = Turn {
            id: Uuid::new_v4(),
            request,
            classification,
            started
        };
        let intent = turn.intent();
        ChatTelemetry::record_request(intent);
        info!(
            request_id = %turn.id,
            intent,
            streaming = turn.request.stream,
            document_id = turn.request.document_id().unwrap_or("-"),
            "Routing chat request"
        );

        let generation = match &turn.classification.intent {
            ClassifiedIntent::Explain {
                section,
                field,
                what_to_explain
            } => {
                let target = ExplainTarget {
                    section,
                    field: field.as_deref(),
                    what_to_explain
                };
                let response = self.explain(&turn, target).await;
                return Ok(self.finish_json(&turn, response));
            }
            ClassifiedIntent::Regenerate {
                section,
                instructions
            } => {
                let response = regenerate_placeholder(&turn, section, instructions);
                return Ok(self.finish_json(&turn, response));
            }
            ClassifiedIntent::Edit {
                section,
                field,
                desired_change
            } => Generation::Edit {
                section: section.clone(),
                field: field.clone(),
                desired_change: desired_change.clone()
            },
            ClassifiedIntent::Question | ClassifiedIntent::General => Generation::Answer
        };

        if turn.request.stream {
            Ok(ChatReply::Stream(self.spawn_stream(turn, generation)))
        } else {
            let response = self.answer(&turn, &generation).await;
            Ok(self.finish_json(&turn, response))
        }
    }

    fn finish_json(&self, turn: &Turn, mut response: ChatResponse) -> ChatReply {
        response.metadata.processing_time = turn.elapsed_ms();
        ChatTelemetry::record_duration(turn.intent(), response.metadata.processing_time as f64);
        ChatReply::Json(Box::new(response))
    }

    async fn build_context(&self, turn: &Turn) -> BuiltContext {
        self.inner
            .context
            .build(
                &turn.request.message,
                turn.request.document_id(),
                &turn.request.document
            )
            .await
    }

    fn generation_request(&self, turn: &Turn, generation: &Generation, context: &BuiltContext) -> GatewayRequest {
        let config = &self.inner.config;
        let history = turn.request.recent_history(config.history_limit);
        let messages = match generation {
            Generation::Answer => {
                prompts::answer_messages(&context.text, history, &turn.request.message)
            }
            Generation::Edit {
                section,
                field,
                desired_change
            } => prompts::edit_messages(
                section,
                field.as_deref(),
                desired_change,
                &turn.request.document,
                &context.text,
                history,
                &turn.request.message
            )
        };

        let request = GatewayRequest::new(&config.chat_model, messages)
            .temperature(config.temperature)
            .max_tokens(config.max_tokens);
        match config.generation_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request
        }
    }

    fn spawn_stream(&self, turn: Turn, generation: Generation) -> mpsc::Receiver<StreamEvent> {
        let (mut writer, rx) = event_channel();
        let this = self.clone();
        let span = info_span!("chat_stream", request_id = %turn.id, intent = turn.intent());

        tokio::spawn(async move {
            let intent = turn.intent();
            let produced = AssertUnwindSafe(this.stream_generation(&mut writer, &turn, &generation))
                .catch_unwind()
                .await;

            let done = match produced {
                Ok(done) => done,
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    error!(intent, reason = %reason, "Response producer panicked");
                    ChatTelemetry::record_stream_error(intent);
                    writer.error(APOLOGY).await;

                    let mut metadata = turn.metadata();
                    metadata.error = Some(reason);
                    let mut done = DoneEvent::new(metadata);
                    done.error = true;
                    done.confidence = Some(ConfidenceLevel::Low);
                    done
                }
            };

            ChatTelemetry::record_duration(intent, done.metadata.processing_time as f64);
            writer.done(done).await;
        }
        .instrument(span));

        rx
    }

    /// Streams one generation and returns the terminal event to send.
    async fn stream_generation(&self, writer: &mut EventWriter, turn: &Turn, generation: &Generation) -> DoneEvent {
        let intent = turn.intent();
        let context = self.build_context(turn).await;
        let mut metadata = turn.metadata();
        apply_context(&mut metadata, &context);

        let request = self.generation_request(turn, generation, &context);
        let model = request.model.clone();
        metadata.model = Some(model.clone());

        let mut prose = ProseFilter::new(generation.is_edit());
        let mut full = String::new();
        let mut usage = UsageRecord::default();

        let idle = self.inner.config.stream_idle_timeout;
        let failure = match self.inner.gateway.chat_stream(request).await {
            Err(e) => Some(e),
            Ok(mut chunks) => loop {
                let next = tokio::select! {
                    next = tokio::time::timeout(idle, chunks.next()) => next,
                    () = writer.closed() => {
                        warn!(intent, "Client disconnected while waiting for the model");
                        break None;
                    }
                };
                let Ok(next) = next else {
                    break Some(GatewayError::Timeout {
                        model: model.clone(),
                        timeout_ms: idle.as_millis() as u64
                    });
                };
                match next {
                    Some(Ok(StreamChunk::Text(fragment))) => {
                        full.push_str(&fragment);
                        if let Some(visible) = prose.push(&fragment) {
                            if !writer.text(visible).await {
                                warn!(intent, "Client disconnected mid-stream");
                                break None;
                            }
                        }
                    }
                    Some(Ok(StreamChunk::Usage(record))) => usage = record,
                    Some(Err(e)) => break Some(e),
                    None => break None
                }
            }
        };
        if let Some(rest) = prose.finish() {
            writer.text(rest).await;
        }

        metadata.generation_tokens = Some(usage.total_tokens);
        metadata.total_cost += usage.cost;
        let mut confidence = confidence::score_context(&context);
        let mut failed = false;

        if let Some(e) = failure {
            warn!(intent, model = %model, error = %e, "Generation failed");
            ChatTelemetry::record_stream_error(intent);
            writer.error(failure_message(&e)).await;
            metadata.error = Some(e.to_string());
            confidence = Confidence::new(
                ConfidenceLevel::Low,
                "The response was interrupted before it completed."
            );
            failed = true;
        } else if generation.is_edit() {
            let outcome = extract_edits(&full);
            confidence = confidence::score_edit(confidence, &outcome);
            if !outcome.edits.is_empty() {
                writer.edits(outcome.edits, confidence.level).await;
            } else if outcome.parse_failed {
                writer.error(EDIT_UNREADABLE).await;
            }
        }

        metadata.processing_time = turn.elapsed_ms();
        let mut done = DoneEvent::new(metadata);
        done.error = failed;
        if context.is_rag() {
            done.sources = Some(context.sources());
            done.source_quality = confidence::source_quality(&context);
        }
        done.confidence = Some(confidence.level);
        done.confidence_explanation = Some(confidence.explanation);
        done
    }

    /// Non-streaming counterpart of [`Self::stream_generation`].
    async fn answer(&self, turn: &Turn, generation: &Generation) -> ChatResponse {
        let context = self.build_context(turn).await;
        let mut metadata = turn.metadata();
        apply_context(&mut metadata, &context);

        let request = self.generation_request(turn, generation, &context);
        metadata.model = Some(request.model.clone());

        let response = match self.inner.gateway.chat(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(intent = turn.intent(), error = %e, "Generation failed");
                return apology(metadata, &e);
            }
        };
        metadata.generation_tokens = Some(response.usage.total_tokens);
        metadata.total_cost += response.usage.cost;

        let mut confidence = confidence::score_context(&context);
        let mut body = ChatResponse::new(response.content, confidence.level);
        if generation.is_edit() {
            let outcome = extract_edits(&body.response);
            confidence = confidence::score_edit(confidence, &outcome);
            body.response = outcome.text;
            if !outcome.edits.is_empty() {
                body.pending_edit = outcome.edits.first().cloned();
                body.pending_edits = Some(outcome.edits);
            }
        }
        body.confidence = confidence.level;
        body.confidence_explanation = Some(confidence.explanation);
        body.metadata = metadata;
        body
    }

    async fn explain(&self, turn: &Turn, target: ExplainTarget<'_>) -> ChatResponse {
        let context = self.build_context(turn).await;
        let mut metadata = turn.metadata();
        apply_context(&mut metadata, &context);
        metadata.model = Some(self.inner.config.explain_model.clone());

        let history = turn.request.recent_history(self.inner.config.history_limit);
        let explanation = match self
            .inner
            .explainer
            .explain(target, &context.text, history, &turn.request.message)
            .await
        {
            Ok(explanation) => explanation,
            Err(e) => {
                warn!(error = %e, "Explanation failed");
                let mut body = apology(metadata, &e);
                body.is_explanation = Some(true);
                return body;
            }
        };

        metadata.model = Some(explanation.model);
        metadata.generation_tokens = Some(explanation.usage.total_tokens);
        metadata.total_cost += explanation.usage.cost;

        let mut body = ChatResponse::new(explanation.explanation, explanation.confidence);
        if explanation.unstructured {
            body.confidence_explanation =
                Some("The explanation could not be structured; showing the raw answer.".to_string());
        }
        body.related_factors = Some(explanation.related_factors);
        body.is_explanation = Some(true);
        body.metadata = metadata;
        body
    }
}

/// Regeneration is not performed from chat. Classification cost is still
/// billed to the request.
fn regenerate_placeholder(turn: &Turn, section: &str, instructions: &str) -> ChatResponse {
    let mut body = ChatResponse::new(
        prompts::regenerate_placeholder(section, instructions),
        ConfidenceLevel::High
    );
    body.confidence_explanation =
        Some("Guidance only; no content was regenerated.".to_string());
    body.is_regenerate = Some(true);
    body.metadata = turn.metadata();
    body.metadata.is_placeholder = Some(true);
    body
}

fn apply_context(metadata: &mut ResponseMetadata, context: &BuiltContext) {
    metadata.context_source = Some(context.source);
    metadata.rag_cost = context.rag_cost;
    metadata.total_cost += context.rag_cost.unwrap_or(0.0);
    if context.is_rag() {
        metadata.chunks_retrieved = Some(context.chunks.len());
    }
}

fn apology(mut metadata: ResponseMetadata, error: &GatewayError) -> ChatResponse {
    let mut body = ChatResponse::new(failure_message(error), ConfidenceLevel::Low);
    body.confidence_explanation = Some(error.to_string());
    metadata.error = Some(error.to_string());
    body.metadata = metadata;
    body
}

fn failure_message(error: &GatewayError) -> &'static str {
    match error {
        GatewayError::CircuitOpen(_) => UNAVAILABLE,
        GatewayError::Timeout { .. } | GatewayError::Transport { .. } => INTERRUPTED,
        _ => APOLOGY
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "response producer panicked".to_string()
    }
}

/// Withholds the structured block from streamed edit prose.
///
/// Uses the extractor's detection rule: a fence is held until it closes and
/// is dropped only when it is an edit fence; a brace opening the marker key
/// withholds everything after it. Any other fence or brace is released as
/// prose once decided.
struct ProseFilter {
    enabled: bool,
    pending: String,
    withholding: bool
}

impl ProseFilter {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            pending: String::new(),
            withholding: false
        }
    }

    fn push(&mut self, fragment: &str) -> Option<String> {
        if !self.enabled {
            return Some(fragment.to_string());
        }
        if self.withholding {
            return None;
        }
        self.pending.push_str(fragment);
        self.release(false)
    }

    fn finish(&mut self) -> Option<String> {
        if !self.enabled || self.withholding {
            return None;
        }
        self.release(true)
    }

    fn release(&mut self, at_end: bool) -> Option<String> {
        let mut visible = String::new();
        loop {
            let fence = self.pending.find("```");
            let brace = self.pending.find('{');
            let next = match (fence, brace) {
                (Some(f), Some(b)) => Some(f.min(b)),
                (f, b) => f.or(b)
            };
            let Some(idx) = next else {
                let held = if at_end {
                    0
                } else {
                    self.pending
                        .chars()
                        .rev()
                        .take_while(|c| *c == '`')
                        .count()
                        .min(2)
                };
                let split = self.pending.len() - held;
                visible.extend(self.pending.drain(..split));
                break;
            };
            visible.extend(self.pending.drain(..idx));

            if self.pending.starts_with("```") {
                let Some(close) = self.pending[3..].find("```") else {
                    if at_end {
                        if !self.pending.contains(MARKER) {
                            visible.push_str(&self.pending);
                        }
                        self.pending.clear();
                    }
                    break;
                };
                let end = close + 6;
                let inner = &self.pending[3..close + 3];
                let lang_len = inner
                    .find(|c: char| !c.is_ascii_alphabetic())
                    .unwrap_or(inner.len());
                let (lang, body) = inner.split_at(lang_len);
                if !is_edit_fence(lang, body.trim()) {
                    visible.push_str(&self.pending[..end]);
                }
                self.pending.replace_range(..end, "");
                continue;
            }

            match opens_bare_block(&self.pending[1..]) {
                Some(true) => {
                    self.withholding = true;
                    self.pending.clear();
                    break;
                }
                Some(false) => {
                    visible.push(self.pending.remove(0));
                }
                None if at_end => {
                    visible.push_str(&self.pending);
                    self.pending.clear();
                    break;
                }
                None => break
            }
        }
        Some(visible).filter(|v| !v.is_empty())
    }
}
