use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use errors::GatewayError;
use futures_util::{StreamExt, stream};
use gateway::{ChunkStream, GatewayRequest, GatewayResponse, ModelGateway, StreamChunk};
use parking_lot::Mutex;
use report_core::UsageRecord;

/// Scripted in-process gateway.
///
/// `chat` and `chat_stream` pop their next scripted result in FIFO order and
/// fall back to a fixed reply when nothing is queued. Every request is
/// recorded so tests can assert on call counts and prompts.
pub struct MockGateway {
    chat_responses: Mutex<VecDeque<Result<GatewayResponse, GatewayError>>>,
    stream_scripts: Mutex<VecDeque<Result<ChunkStream, GatewayError>>>,
    requests: Mutex<Vec<GatewayRequest>>,
    chat_calls: AtomicUsize,
    stream_calls: AtomicUsize
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            chat_responses: Mutex::new(VecDeque::new()),
            stream_scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            chat_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0)
        }
    }

    pub fn push_chat_text(&self, content: &str) -> &Self {
        self.push_chat_response(
            GatewayResponse::text("mock", content).with_usage(UsageRecord::new(40, 12, 0.0002))
        )
    }

    pub fn push_chat_response(&self, response: GatewayResponse) -> &Self {
        self.chat_responses.lock().push_back(Ok(response));
        self
    }

    pub fn push_chat_error(&self, error: GatewayError) -> &Self {
        self.chat_responses.lock().push_back(Err(error));
        self
    }

    /// Queues a stream yielding `fragments` followed by a usage record.
    pub fn push_stream(&self, fragments: &[&str]) -> &Self {
        let mut items = text_chunks(fragments);
        items.push(Ok(StreamChunk::Usage(UsageRecord::new(300, 80, 0.0021))));
        self.push_stream_script(items)
    }

    pub fn push_stream_script(&self, items: Vec<Result<StreamChunk, GatewayError>>) -> &Self {
        self.stream_scripts
            .lock()
            .push_back(Ok(stream::iter(items).boxed()));
        self
    }

    /// Queues a stream that yields `fragments` and then never produces
    /// another item nor ends.
    pub fn push_stalled_stream(&self, fragments: &[&str]) -> &Self {
        let stalled = stream::iter(text_chunks(fragments)).chain(stream::pending());
        self.stream_scripts.lock().push_back(Ok(stalled.boxed()));
        self
    }

    /// Queues a stream that fails before yielding anything.
    pub fn push_stream_error(&self, error: GatewayError) -> &Self {
        self.stream_scripts.lock().push_back(Err(error));
        self
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.chat_calls() + self.stream_calls()
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn chat(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        let model = request.model.clone();
        self.requests.lock().push(request);

        let scripted = self.chat_responses.lock().pop_front();
        match scripted {
            Some(Ok(mut response)) => {
                response.model = model;
                Ok(response)
            }
            Some(Err(error)) => Err(error),
            None => Ok(GatewayResponse::text(model, "Mock response"))
        }
    }

    async fn chat_stream(&self, request: GatewayRequest) -> Result<ChunkStream, GatewayError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);

        let scripted = self.stream_scripts.lock().pop_front();
        match scripted {
            Some(script) => script,
            None => Ok(stream::iter(text_chunks(&["Mock ", "response"])).boxed())
        }
    }
}

fn text_chunks(fragments: &[&str]) -> Vec<Result<StreamChunk, GatewayError>> {
    fragments
        .iter()
        .map(|f| Ok(StreamChunk::Text((*f).to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::ChatMessage;

    fn request() -> GatewayRequest {
        GatewayRequest::new("openai/gpt-4o-mini", vec![ChatMessage::user("hi")])
    }

    #[tokio::test]
    async fn test_chat_pops_scripted_responses_in_order() {
        let gateway = MockGateway::new();
        gateway.push_chat_text("first").push_chat_text("second");

        assert_eq!(gateway.chat(request()).await.unwrap().content, "first");
        assert_eq!(gateway.chat(request()).await.unwrap().content, "second");
        assert_eq!(gateway.chat(request()).await.unwrap().content, "Mock response");
        assert_eq!(gateway.chat_calls(), 3);
        assert_eq!(gateway.requests()[0].model, "openai/gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_stream_script_yields_fragments_then_usage() {
        let gateway = MockGateway::new();
        gateway.push_stream(&["a", "b"]);

        let items: Vec<_> = gateway
            .chat_stream(request())
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), &StreamChunk::Text("a".to_string()));
        assert!(matches!(items[2], Ok(StreamChunk::Usage(_))));
        assert_eq!(gateway.stream_calls(), 1);
    }

    #[tokio::test]
    async fn test_stream_error_before_first_chunk() {
        let gateway = MockGateway::new();
        gateway.push_stream_error(GatewayError::NotConfigured {
            reason: "no key".to_string()
        });
        assert!(gateway.chat_stream(request()).await.is_err());
    }

    #[tokio::test]
    async fn test_stalled_stream_keeps_waiting() {
        let gateway = MockGateway::new();
        gateway.push_stalled_stream(&["partial"]);

        let mut chunks = gateway.chat_stream(request()).await.unwrap();
        assert_eq!(chunks.next().await.unwrap().unwrap(), StreamChunk::Text("partial".to_string()));
        let next = tokio::time::timeout(std::time::Duration::from_millis(20), chunks.next()).await;
        assert!(next.is_err());
    }
}
