//! Bounded output buffers and incremental line splitting.

use std::collections::VecDeque;
use std::sync::OnceLock;

use regex::Regex;

/// Default number of lines kept per output channel.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

/// Longest line held back waiting for a terminator. Longer runs are split.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Fixed-capacity FIFO; pushing into a full buffer drops the oldest item.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(DEFAULT_BUFFER_CAPACITY)),
            capacity,
        }
    }

    /// Push an item, returning the evicted one when full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

}

/// Splits a byte stream into lines, holding a partial line until its
/// terminator arrives.
///
/// Lines are decoded only once complete, so a multi-byte character split
/// across two chunks is never mangled. At most [`MAX_LINE_BYTES`] are held;
/// output without newlines (terminal redraws) is cut into lines of that size.
#[derive(Debug, Clone, Default)]
pub struct LineSplitter {
    partial: Vec<u8>,
}

impl LineSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for segment in chunk.split_inclusive(|b| *b == b'\n') {
            let (body, complete) = match segment.strip_suffix(b"\n") {
                Some(body) => (body, true),
                None => (segment, false),
            };
            self.partial.extend_from_slice(body);
            while self.partial.len() > MAX_LINE_BYTES {
                let rest = self.partial.split_off(MAX_LINE_BYTES);
                lines.push(decode_line(&self.partial));
                self.partial = rest;
            }
            if complete {
                lines.push(decode_line(&self.partial));
                self.partial.clear();
            }
        }
        lines
    }

    /// Return the unterminated remainder, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        let line = decode_line(&self.partial);
        self.partial.clear();
        Some(line)
    }

    /// Bytes waiting for a terminator.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.partial.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    strip_ansi(&String::from_utf8_lossy(bytes))
}

/// Remove terminal escape sequences (colors, cursor movement).
#[must_use]
pub fn strip_ansi(text: &str) -> String {
    static ANSI: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = ANSI
        .get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07]*\x07").ok())
        .as_ref()
    else {
        return text.to_string();
    };
    if !text.contains('\x1b') {
        return text.to_string();
    }
    re.replace_all(text, "").into_owned()
}
