//! SSE (Server-Sent Events) frame decoding
//!
//! Turns an append-only byte stream into chat-completion events, tolerating
//! arbitrary chunk boundaries. Holds no network or timer state.

use serde_json::Value;

/// Prefix of the only SSE field we care about
pub const DATA_PREFIX: &str = "data:";

/// Payload that ends the stream
pub const DONE_MARKER: &str = "[DONE]";

/// Blank line separating events (after CR-LF normalization)
const EVENT_DELIMITER: &str = "\n\n";

/// One completed SSE event: the payloads of its `data:` lines, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub data: Vec<String>,
}

impl RawEvent {
    fn parse(block: &str) -> Self {
        let data = block
            .trim()
            .lines()
            .map(str::trim)
            .filter_map(|line| line.strip_prefix(DATA_PREFIX))
            .map(|payload| payload.trim().to_string())
            .collect();
        Self { data }
    }
}

/// Events produced by [`FrameDecoder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A fragment of assistant output text
    Delta(String),
    /// The terminator was seen; nothing follows
    Done,
}

/// Append `new_text` to `buffer` and split off every completed event.
///
/// Returns the completed events and the updated buffer. Text after the last
/// delimiter is carried forward unchanged; an event is never emitted before
/// its delimiter has arrived.
pub fn split_frames(buffer: &str, new_text: &str) -> (Vec<RawEvent>, String) {
    let mut combined = String::with_capacity(buffer.len() + new_text.len());
    combined.push_str(buffer);
    combined.push_str(new_text);

    // A CR left at the end of the previous buffer pairs with an LF here
    if combined.contains("\r\n") {
        combined = combined.replace("\r\n", "\n");
    }

    let mut events = Vec::new();
    let mut rest = combined.as_str();
    while let Some(boundary) = rest.find(EVENT_DELIMITER) {
        events.push(RawEvent::parse(&rest[..boundary]));
        rest = &rest[boundary + EVENT_DELIMITER.len()..];
    }

    (events, rest.to_string())
}

/// Interpret one data-line payload.
///
/// Unparseable JSON, a missing `choices[0].delta.content` string, and empty
/// content all yield `None`.
pub fn interpret_payload(payload: &str) -> Option<SseEvent> {
    if payload == DONE_MARKER {
        return Some(SseEvent::Done);
    }

    let json: Value = serde_json::from_str(payload).ok()?;
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|t| t.as_str())?;

    if content.is_empty() {
        return None;
    }
    Some(SseEvent::Delta(content.to_string()))
}

/// Stateful UTF-8 decoding across chunk boundaries.
///
/// Bytes of a character split between chunks are held until the rest arrives.
/// Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::with_capacity(self.pending.len());
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match e.error_len() {
                        // Incomplete trailing sequence: wait for more bytes
                        None => {
                            self.pending.drain(..valid_up_to);
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + len);
                        }
                    }
                }
            }
        }
        out
    }

    /// Bytes held back waiting for the rest of a character
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Incremental decoder from raw body bytes to [`SseEvent`]s
#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8: Utf8Decoder,
    buffer: String,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }
        let text = self.utf8.decode(bytes);
        self.feed_text(&text)
    }

    /// Feed already-decoded text.
    ///
    /// Once [`SseEvent::Done`] is returned the decoder is finished: the rest of
    /// the buffer is dropped and later input is ignored.
    pub fn feed_text(&mut self, text: &str) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }

        let (raw_events, rest) = split_frames(&self.buffer, text);
        self.buffer = rest;

        let mut events = Vec::new();
        for raw in raw_events {
            for payload in &raw.data {
                match interpret_payload(payload) {
                    Some(SseEvent::Done) => {
                        self.finish();
                        events.push(SseEvent::Done);
                        return events;
                    }
                    Some(event) => events.push(event),
                    None => {}
                }
            }
        }
        events
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Text waiting for its event delimiter
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    fn finish(&mut self) {
        self.finished = true;
        self.buffer.clear();
        self.utf8 = Utf8Decoder::new();
    }
}
