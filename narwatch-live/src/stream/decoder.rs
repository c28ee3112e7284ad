//! Incremental Server-Sent Events decoder
//!
//! Turns the raw byte chunks of a `text/event-stream` body into complete
//! messages. Chunks may split lines, fields or UTF-8 sequences anywhere; the
//! decoder buffers until a full line is available.
//!
//! Field handling follows the EventSource processing model:
//! - `data:` lines accumulate, joined with `\n`
//! - `event:` sets the message type (default `message`)
//! - `id:` sets the last event id
//! - `retry:` records the server's reconnection hint
//! - lines starting with `:` are comments (keep-alives)
//! - a blank line dispatches the pending message, if it has data

/// Event type used when the server does not name one
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// One dispatched SSE message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

impl SseMessage {
    /// Unnamed messages are the ones an EventSource delivers to `onmessage`
    pub fn is_default_type(&self) -> bool {
        self.event == DEFAULT_EVENT_TYPE
    }
}

/// Stateful decoder for one stream body
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    last_event_id: Option<String>,
    retry_ms: Option<u64>,
    started: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last `retry:` value the server sent, in milliseconds
    pub fn retry_hint_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    /// Feed one chunk and collect every message it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buffer.extend_from_slice(chunk);
        if !self.started && self.buffer.len() >= 3 {
            if self.buffer.starts_with(b"\xEF\xBB\xBF") {
                self.buffer.drain(..3);
            }
            self.started = true;
        }

        let mut messages = Vec::new();
        let mut consumed = 0;

        while let Some(offset) = self.buffer[consumed..]
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')
        {
            let end = consumed + offset;
            let terminator = self.buffer[end];
            let next = end + 1;

            let line_end = if terminator == b'\r' {
                match self.buffer.get(next) {
                    Some(b'\n') => next + 1,
                    Some(_) => next,
                    // A trailing CR may be the first half of CRLF
                    None => break,
                }
            } else {
                next
            };

            let line = String::from_utf8_lossy(&self.buffer[consumed..end]).into_owned();
            consumed = line_end;

            if let Some(message) = self.process_line(&line) {
                messages.push(message);
            }
        }

        self.buffer.drain(..consumed);
        messages
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_event_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry_ms = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseMessage {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
            data,
            id: self.last_event_id.clone(),
        })
    }
}
