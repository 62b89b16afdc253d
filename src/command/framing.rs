//! # Line Framing
//!
//! Splits the raw byte stream from the transport into command lines.
//! A line ends at `\n` or `\r`; empty lines are ignored. Lines longer than
//! the budget are discarded whole, up to their terminator.

use bytes::{BufMut, BytesMut};

use super::protocol::MAX_LINE_LEN;

/// One framed unit of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line without its terminator
    Line(String),
    /// A line that exceeded the length budget
    Overflow,
}

/// Incremental line splitter with a bounded buffer
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    max_len: usize,
    overflowed: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_len),
            max_len,
            overflowed: false,
        }
    }

    /// Feed received bytes and collect every frame they complete
    ///
    /// Bytes after the last terminator stay buffered for the next call.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();

        for &byte in data {
            if byte == b'\n' || byte == b'\r' {
                if self.overflowed {
                    frames.push(Frame::Overflow);
                } else if !self.buf.is_empty() {
                    let line = self.buf.split();
                    frames.push(Frame::Line(String::from_utf8_lossy(&line).into_owned()));
                }
                self.buf.clear();
                self.overflowed = false;
            } else if self.overflowed {
                // Drop until the terminator
            } else if self.buf.len() < self.max_len {
                self.buf.put_u8(byte);
            } else {
                self.buf.clear();
                self.overflowed = true;
            }
        }

        frames
    }

    /// Bytes of the current partial line
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}
