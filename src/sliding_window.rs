#![forbid(unsafe_code)]

use std::collections::VecDeque;

////////////////////////////////////////////////////////////////////////////////

/// Largest back-reference distance DEFLATE can express.
pub const HISTORY_SIZE: usize = 32 * (1 << 10);

/// The most recently emitted output bytes, oldest evicted first.
#[derive(Debug)]
pub struct SlidingWindow {
    buf: VecDeque<u8>,
    capacity: usize,
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingWindow {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn push(&mut self, byte: u8) {
        self.buf.push_back(byte);
        if self.buf.len() > self.capacity {
            self.buf.pop_front();
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        if bytes.len() >= self.capacity {
            self.buf.clear();
            self.buf.extend(&bytes[bytes.len() - self.capacity..]);
            return;
        }

        self.buf.extend(bytes);
        let excess = self.buf.len().saturating_sub(self.capacity);
        self.buf.drain(..excess);
    }

    /// Byte `distance` positions back; distance 1 is the last pushed byte.
    pub fn read_back(&self, distance: usize) -> Option<u8> {
        if distance == 0 || distance > self.buf.len() {
            return None;
        }

        self.buf.get(self.buf.len() - distance).copied()
    }
}

////////////////////////////////////////////////////////////////////////////////
