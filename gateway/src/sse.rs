//! Decoder for OpenAI-compatible server-sent completion streams.
//!
//! Frames are `data: <json>` lines; `data: [DONE]` or end of body terminates
//! the stream. Comment lines (leading `:`) and blank separators are skipped.

use std::collections::VecDeque;
use std::fmt::Display;

use errors::GatewayError;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use crate::types::{ChunkStream, StreamChunk};
use crate::client::ApiUsage;

#[derive(Debug, Deserialize)]
struct ApiStreamFrame {
    #[serde(default)]
    choices: Vec<ApiStreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<ApiStreamError>
}

#[derive(Debug, Deserialize)]
struct ApiStreamChoice {
    #[serde(default)]
    delta: ApiDelta
}

#[derive(Debug, Default, Deserialize)]
struct ApiDelta {
    #[serde(default)]
    content: Option<String>
}

#[derive(Debug, Deserialize)]
struct ApiStreamError {
    #[serde(default)]
    message: String
}

struct Decoder<S> {
    inner: S,
    model: String,
    buffer: Vec<u8>,
    pending: VecDeque<Result<StreamChunk, GatewayError>>,
    finished: bool
}

impl<S> Decoder<S> {
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.handle_line(&String::from_utf8_lossy(&line));
            if self.finished {
                self.buffer.clear();
                return;
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return;
        }
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if data == "[DONE]" {
            self.finished = true;
            return;
        }

        match serde_json::from_str::<ApiStreamFrame>(data) {
            Ok(frame) => {
                if let Some(error) = frame.error {
                    self.pending.push_back(Err(GatewayError::InvalidResponse {
                        model: self.model.clone(),
                        reason: error.message
                    }));
                    self.finished = true;
                    return;
                }
                for choice in frame.choices {
                    if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                        self.pending.push_back(Ok(StreamChunk::Text(content)));
                    }
                }
                if let Some(usage) = frame.usage {
                    self.pending
                        .push_back(Ok(StreamChunk::Usage(usage.into_record(&self.model))));
                }
            }
            Err(e) => {
                tracing::debug!(model = %self.model, error = %e, "Skipping undecodable stream frame");
            }
        }
    }
}

/// Turns a raw byte stream into completion chunks.
pub(crate) fn decode<S, B, E>(bytes: S, model: String) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static
{
    let decoder = Decoder {
        inner: bytes,
        model,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false
    };

    futures_util::stream::unfold(decoder, |mut decoder| async move {
        loop {
            if let Some(item) = decoder.pending.pop_front() {
                return Some((item, decoder));
            }
            if decoder.finished {
                return None;
            }
            match decoder.inner.next().await {
                Some(Ok(bytes)) => {
                    decoder.buffer.extend_from_slice(bytes.as_ref());
                    decoder.drain_lines();
                }
                Some(Err(e)) => {
                    decoder.finished = true;
                    decoder.pending.push_back(Err(GatewayError::Transport {
                        model: decoder.model.clone(),
                        reason: e.to_string()
                    }));
                }
                None => {
                    if !decoder.buffer.is_empty() {
                        let rest = std::mem::take(&mut decoder.buffer);
                        decoder.handle_line(&String::from_utf8_lossy(&rest));
                    }
                    decoder.finished = true;
                }
            }
        }
    })
    .boxed()
}
