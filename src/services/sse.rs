//! Server-Sent Events decoding
//!
//! Network chunks do not respect line boundaries, so partial lines are
//! buffered until their newline arrives.

use crate::utils::error::{ProbeError, ProbeResult};
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::debug;

/// Boxed stream of SSE `data:` payloads
pub type SseStream = Pin<Box<dyn Stream<Item = ProbeResult<String>> + Send>>;

/// Incremental SSE line decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `data: [DONE]` has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one network chunk, returning the complete `data:` payloads it finished
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = self.handle_line(&line) {
                payloads.push(data);
            }
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        payloads
    }

    /// Flush a trailing line that arrived without its newline
    pub fn finish(&mut self) -> Vec<String> {
        if self.done || self.buffer.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        self.handle_line(&line).into_iter().collect()
    }

    fn handle_line(&mut self, raw: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');

        // Blank lines separate events, ':' starts a comment
        if line.is_empty() || line.starts_with(':') {
            return None;
        }

        // event:, id: and retry: lines carry nothing the probes read
        let data = line.strip_prefix("data:")?.trim_start();

        if data.trim() == "[DONE]" {
            debug!("Received streaming response end marker");
            self.done = true;
            return None;
        }

        Some(data.to_string())
    }
}

/// Turn a byte stream into a stream of SSE `data:` payloads ending at `[DONE]`
pub fn decode_sse<S, B, E>(bytes: S) -> SseStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ProbeError> + Send + 'static,
{
    let state = (Box::pin(bytes), SseDecoder::new(), VecDeque::new(), false);

    let stream = stream::unfold(state, |(mut bytes, mut decoder, mut pending, mut ended)| async move {
        loop {
            if let Some(data) = pending.pop_front() {
                return Some((Ok(data), (bytes, decoder, pending, ended)));
            }
            if ended || decoder.is_done() {
                return None;
            }
            match bytes.next().await {
                Some(Ok(chunk)) => pending.extend(decoder.push(chunk.as_ref())),
                Some(Err(e)) => return Some((Err(e.into()), (bytes, decoder, pending, true))),
                None => {
                    pending.extend(decoder.finish());
                    ended = true;
                }
            }
        }
    });

    Box::pin(stream)
}
