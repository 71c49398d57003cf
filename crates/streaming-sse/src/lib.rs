//! # Line-record stream decoding
//!
//! watsonx streaming endpoints push `key: value` lines grouped into records by
//! blank lines (an SSE-style framing). This module provides:
//! - `StreamRecord`: one finalized record (`id`, `event`, `data`, extra keys)
//! - `RecordDecoder`: incremental decoder that is insensitive to where the
//!   transport splits packets
//! - `RecordStream`: adapter from a byte stream to a record stream

use std::collections::{BTreeMap, VecDeque};

/// One blank-line-delimited group of `key: value` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamRecord {
    /// Numeric record id, when the `id` value parses as an integer
    pub id: Option<u64>,
    /// Event tag (e.g. `message`, `error`, `close`)
    pub event: Option<String>,
    /// Raw `data` payload; repeated `data` lines are joined with `\n`
    pub data: Option<String>,
    /// Every other key, verbatim; a later line with the same key wins
    pub extra: BTreeMap<String, String>,
}

impl StreamRecord {
    /// Record carrying only a data payload.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    fn is_empty(&self) -> bool {
        self.id.is_none() && self.event.is_none() && self.data.is_none() && self.extra.is_empty()
    }

    fn assign(&mut self, key: &str, value: &str) {
        match key {
            "id" => match value.trim().parse::<u64>() {
                Ok(id) => self.id = Some(id),
                Err(_) => {
                    self.extra.insert(key.to_string(), value.to_string());
                }
            },
            "event" => self.event = Some(value.to_string()),
            "data" => match &mut self.data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            },
            _ => {
                self.extra.insert(key.to_string(), value.to_string());
            }
        }
    }
}

/// Incremental record decoder.
///
/// Bytes are buffered until a full line (`\n`, `\r\n` or `\r`) is available,
/// so multi-byte characters and records split across packets decode the same
/// as a single packet. Each blank line finalizes the record under
/// construction into a fresh value.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    buffer: Vec<u8>,
    current: StreamRecord,
    ready: VecDeque<StreamRecord>,
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a packet and drain the records it completed.
    pub fn push(&mut self, chunk: &[u8]) -> impl Iterator<Item = StreamRecord> + '_ {
        self.buffer.extend_from_slice(chunk);
        self.process_lines(false);
        self.ready.drain(..)
    }

    /// True while a partial line or an unterminated record is pending.
    pub fn has_buffered_data(&self) -> bool {
        !self.buffer.is_empty() || !self.current.is_empty()
    }

    /// Flush at end of input.
    ///
    /// A trailing line without terminator and a record without the closing
    /// blank line are both emitted rather than dropped.
    pub fn finish(&mut self) -> impl Iterator<Item = StreamRecord> + '_ {
        self.process_lines(true);
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.handle_line(&rest);
        }
        self.flush_record();
        self.ready.drain(..)
    }

    fn process_lines(&mut self, at_eof: bool) {
        let mut start = 0;
        let mut idx = 0;
        while idx < self.buffer.len() {
            match self.buffer[idx] {
                b'\n' => {
                    let line = self.buffer[start..idx].to_vec();
                    self.handle_line(&line);
                    idx += 1;
                    start = idx;
                }
                b'\r' => {
                    // a lone trailing CR may still be the first half of CRLF
                    if idx + 1 >= self.buffer.len() && !at_eof {
                        break;
                    }
                    let line = self.buffer[start..idx].to_vec();
                    self.handle_line(&line);
                    idx += 1;
                    if self.buffer.get(idx) == Some(&b'\n') {
                        idx += 1;
                    }
                    start = idx;
                }
                _ => idx += 1,
            }
        }
        self.buffer.drain(..start);
    }

    fn handle_line(&mut self, raw: &[u8]) {
        if raw.is_empty() {
            self.flush_record();
            return;
        }
        let line = String::from_utf8_lossy(raw);
        if line.starts_with(':') {
            return;
        }
        // `: ` delimits; a line without it splits at its first `:`, if any
        let (key, value) = match line.find(": ") {
            Some(pos) => (&line[..pos], &line[pos + 2..]),
            None => match line.find(':') {
                Some(pos) => (&line[..pos], &line[pos + 1..]),
                None => (&line[..], ""),
            },
        };
        self.current.assign(key, value);
    }

    fn flush_record(&mut self) {
        let record = std::mem::take(&mut self.current);
        if !record.is_empty() {
            self.ready.push_back(record);
        }
    }
}

#[cfg(feature = "stream")]
pub mod stream;

#[cfg(feature = "stream")]
pub use stream::{RecordStream, RecordStreamExt};

#[cfg(test)]
#[path = "../tests/decoder_tests.rs"]
mod decoder_tests;

#[cfg(all(test, feature = "stream"))]
#[path = "../tests/stream_tests.rs"]
mod stream_tests;
