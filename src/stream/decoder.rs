//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes may arrive split anywhere, including inside a UTF-8 sequence or between the
//! `\r` and `\n` of a line ending. The decoder only emits a frame once its blank-line
//! terminator has been seen, so the output never depends on how the body was chunked.

use serde::de::DeserializeOwned;
use serde_json::Value;

pub const DEFAULT_EVENT: &str = "message";

/// Largest incomplete frame the decoder buffers before giving up on the stream.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// One decoded event-stream frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub event: String,
    /// The joined `data:` lines, parsed as JSON when possible, else a string.
    pub data: Value,
    /// The frame text as received, with line endings normalised.
    pub raw: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

impl SseFrame {
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.data.clone()).ok()
    }
}

#[derive(Debug)]
pub struct SseFrameDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending_bytes: Vec<u8>,
    buffer: String,
    /// Offset in `buffer` up to which no frame terminator exists.
    scanned: usize,
    /// A `\r` was the last character seen; it may be the first half of `\r\n`.
    pending_cr: bool,
    max_frame_len: usize,
    overflowed: bool,
}

impl Default for SseFrameDecoder {
    fn default() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            pending_bytes: Vec::new(),
            buffer: String::new(),
            scanned: 0,
            pending_cr: false,
            max_frame_len,
            overflowed: false,
        }
    }

    /// True once an unterminated frame grew past the limit. The decoder then drops
    /// its buffer and ignores further input.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Feeds one chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        if self.overflowed {
            return Vec::new();
        }
        self.pending_bytes.extend_from_slice(chunk);
        let text = self.take_decoded(false);
        self.append_normalized(&text);
        let frames = self.drain_frames();
        if self.buffer.len() > self.max_frame_len {
            self.overflowed = true;
            self.buffer = String::new();
            self.pending_bytes.clear();
            self.scanned = 0;
        }
        frames
    }

    /// Flushes whatever is left once the body has ended.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        if self.overflowed {
            return Vec::new();
        }
        let text = self.take_decoded(true);
        self.append_normalized(&text);
        if std::mem::take(&mut self.pending_cr) {
            self.buffer.push('\n');
        }

        let mut frames = self.drain_frames();
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if !rest.trim().is_empty() {
            frames.extend(parse_frame(&rest));
        }
        frames
    }

    fn take_decoded(&mut self, at_end: bool) -> String {
        let mut out = String::new();
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending_bytes[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending_bytes.len();
                    break;
                }
                Err(err) => {
                    let valid_up_to = start + err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending_bytes[start..valid_up_to]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_up_to + len;
                        }
                        None if at_end => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = self.pending_bytes.len();
                            break;
                        }
                        None => {
                            start = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }
        self.pending_bytes.drain(..start);
        out
    }

    fn append_normalized(&mut self, text: &str) {
        for c in text.chars() {
            if self.pending_cr {
                self.pending_cr = false;
                self.buffer.push('\n');
                if c == '\n' {
                    continue;
                }
            }
            if c == '\r' {
                self.pending_cr = true;
            } else {
                self.buffer.push(c);
            }
        }
    }

    fn drain_frames(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buffer[from..].find("\n\n") {
            let end = from + offset;
            frames.extend(parse_frame(&self.buffer[start..end]));
            start = end + 2;
            from = start;
        }
        self.buffer.drain(..start);

        // A trailing `\n` may pair with the first character of the next chunk.
        self.scanned = if self.buffer.ends_with('\n') {
            self.buffer.len() - 1
        } else {
            self.buffer.len()
        };
        frames
    }
}

fn parse_frame(block: &str) -> Option<SseFrame> {
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();
    let mut id = None;
    let mut retry = None;

    for line in block.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value),
            "id" => id = Some(value.to_string()),
            "retry" => retry = value.trim().parse::<u64>().ok(),
            _ => {}
        }
    }

    if event.is_none() && data_lines.is_empty() && id.is_none() {
        return None;
    }

    let data = data_lines.join("\n");
    let data = serde_json::from_str(&data).unwrap_or(Value::String(data));
    Some(SseFrame {
        event: event
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
        data,
        raw: block.trim_matches('\n').to_string(),
        id,
        retry,
    })
}
