/*!
 * Incremental decoder for server-sent event streams.
 *
 * Network chunks can end in the middle of a line or of a UTF-8 sequence, so
 * bytes are buffered until a full line is available.
 */

use log::debug;
use serde_json::Value;

/// A decoded stream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line
    Data(String),
    /// The `[DONE]` sentinel
    Done,
}

/// Line-buffering SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `[DONE]` has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a network chunk and return the events of all completed lines
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = self.decode_line(&line) {
                events.push(event);
                if self.done {
                    self.buffer.clear();
                    break;
                }
            }
        }
        events
    }

    /// Decode a trailing line that was not newline terminated
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if self.done || self.buffer.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line).into_iter().collect()
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<SseEvent> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();

        if line.is_empty() || line.starts_with(':') {
            return None;
        }

        let payload = line.strip_prefix("data:")?.trim_start();
        if payload == "[DONE]" {
            self.done = true;
            return Some(SseEvent::Done);
        }

        Some(SseEvent::Data(payload.to_string()))
    }
}

/// Text delta of a streamed chat completion chunk
///
/// Payloads that are not valid JSON are skipped.
pub fn delta_content(payload: &str) -> Option<String> {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            debug!("Skipping unparseable stream payload: {}", e);
            return None;
        }
    };

    value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
