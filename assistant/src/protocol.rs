//! Streaming protocol encoding.
//!
//! Events travel as one JSON object per server-sent `data:` frame. The
//! [`EventWriter`] enforces ordering on the producer side: text, at most one
//! edits event, an optional error, then exactly one final done.

use report_core::{ConfidenceLevel, DoneEvent, PendingEdit, ResponseMetadata, StreamEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Capacity of the per-request event channel.
pub const EVENT_BUFFER: usize = 64;

pub fn encode_event(event: &StreamEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

pub fn sse_frame(event: &StreamEvent) -> Result<String, serde_json::Error> {
    Ok(format!("data: {}\n\n", encode_event(event)?))
}

/// Decodes a complete `text/event-stream` body. Frames that are not
/// protocol events are skipped.
pub fn parse_sse_body(body: &str) -> Vec<StreamEvent> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str(data.trim()).ok())
        .collect()
}

pub fn event_channel() -> (EventWriter, mpsc::Receiver<StreamEvent>) {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    (EventWriter::new(tx), rx)
}

/// Producer half of a response stream.
///
/// Sends are awaited, so a slow client applies backpressure to generation.
/// A closed receiver is remembered and later sends become no-ops. Dropping
/// a writer that never sent `done` emits an error-flagged done.
pub struct EventWriter {
    tx: mpsc::Sender<StreamEvent>,
    edits_sent: bool,
    done_sent: bool,
    closed: bool
}

impl EventWriter {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx,
            edits_sent: false,
            done_sent: false,
            closed: false
        }
    }

    /// Receiver has gone away.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Resolves once the receiver has gone away.
    pub async fn closed(&mut self) {
        self.tx.closed().await;
        self.closed = true;
    }

    pub async fn text(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        if content.is_empty() {
            return !self.closed;
        }
        self.send(StreamEvent::Text { content }).await
    }

    /// Sends the edits event. Only the first call has any effect.
    pub async fn edits(&mut self, pending_edits: Vec<PendingEdit>, confidence: ConfidenceLevel) -> bool {
        if self.edits_sent {
            warn!("Ignoring second edits event");
            return false;
        }
        self.edits_sent = true;
        self.send(StreamEvent::Edits {
            pending_edits,
            confidence
        })
        .await
    }

    pub async fn error(&mut self, error: impl Into<String>) -> bool {
        self.send(StreamEvent::Error { error: error.into() }).await
    }

    /// Sends the terminal event and closes the stream.
    pub async fn done(mut self, done: DoneEvent) {
        self.done_sent = true;
        self.send(StreamEvent::Done(done)).await;
    }

    async fn send(&mut self, event: StreamEvent) -> bool {
        if self.closed || (self.done_sent && !event.is_done()) {
            return false;
        }
        if self.tx.send(event).await.is_err() {
            debug!("Stream receiver dropped");
            self.closed = true;
        }
        !self.closed
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        if self.done_sent || self.closed {
            return;
        }
        let mut done = DoneEvent::new(ResponseMetadata::default());
        done.error = true;
        done.metadata.error = Some("stream ended unexpectedly".to_string());
        if self.tx.try_send(StreamEvent::Done(done)).is_err() {
            warn!("Could not deliver terminal event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_wire_shapes() {
        let text = serde_json::to_value(StreamEvent::text("Hi")).unwrap();
        assert_eq!(text, json!({"type": "text", "content": "Hi"}));

        let edits = serde_json::to_value(StreamEvent::Edits {
            pending_edits: vec![],
            confidence: ConfidenceLevel::High
        })
        .unwrap();
        assert_eq!(edits, json!({"type": "edits", "pendingEdits": [], "confidence": "high"}));

        let error = serde_json::to_value(StreamEvent::Error {
            error: "boom".to_string()
        })
        .unwrap();
        assert_eq!(error, json!({"type": "error", "error": "boom"}));

        let mut done = DoneEvent::new(ResponseMetadata {
            intent_type: "question".to_string(),
            ..ResponseMetadata::default()
        });
        done.error = true;
        let value = serde_json::to_value(StreamEvent::Done(done)).unwrap();
        assert_eq!(value["type"], "done");
        assert_eq!(value["done"], true);
        assert_eq!(value["error"], true);
        assert_eq!(value["metadata"]["intentType"], "question");
    }

    #[test]
    fn test_sse_frames_round_trip_through_body_parser() {
        let events = vec![
            StreamEvent::text("a"),
            StreamEvent::Done(DoneEvent::new(ResponseMetadata::default())),
        ];
        let body: String = events.iter().map(|e| sse_frame(e).unwrap()).collect();
        assert!(body.starts_with("data: {\"type\":\"text\""));
        assert_eq!(parse_sse_body(&format!(": ping\n\n{}", body)), events);
    }

    #[tokio::test]
    async fn test_writer_orders_and_terminates() {
        let (mut writer, rx) = event_channel();
        assert!(writer.text("one").await);
        assert!(writer.text("").await);
        assert!(writer.edits(vec![], ConfidenceLevel::High).await);
        assert!(!writer.edits(vec![], ConfidenceLevel::Low).await);
        writer.done(DoneEvent::new(ResponseMetadata::default())).await;

        let events = drain(rx).await;
        assert_eq!(events.len(), 3);
        assert!(events[2].is_done());
    }

    #[tokio::test]
    async fn test_dropped_writer_still_terminates_stream() {
        let (mut writer, rx) = event_channel();
        writer.text("partial").await;
        drop(writer);

        let events = drain(rx).await;
        assert_eq!(events.len(), 2);
        match &events[1] {
            StreamEvent::Done(done) => assert!(done.error),
            other => panic!("expected done, got {other:?}")
        }
    }

    #[tokio::test]
    async fn test_closed_receiver_is_detected() {
        let (mut writer, rx) = event_channel();
        drop(rx);
        assert!(!writer.text("lost").await);
        assert!(writer.is_closed());
    }

    #[tokio::test]
    async fn test_closed_resolves_when_receiver_drops() {
        let (mut writer, rx) = event_channel();
        let dropper = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            drop(rx);
        });

        tokio::time::timeout(std::time::Duration::from_secs(1), writer.closed())
            .await
            .unwrap();
        assert!(writer.is_closed());
        dropper.await.unwrap();
    }
}
