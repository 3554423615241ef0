//! Line framing for the board's output stream.
//!
//! The EBB terminates its replies with `\r\n`, although some firmware paths
//! emit `\n\r`. Either pair counts as one delimiter; a lone `\r` or `\n`
//! also ends a line. Pairs split across two reads are handled by remembering
//! which byte would complete the pair.

use bytes::{Buf, BytesMut};
use tracing::warn;

/// Default upper bound on a single line before the buffer is reset.
pub const MAX_LINE: usize = 4096;

/// Incremental splitter from raw bytes to lines.
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    max_line: usize,
    /// The byte that would complete the previous delimiter pair.
    pair: Option<u8>,
}

impl LineFramer {
    pub fn new(max_line: usize) -> Self {
        LineFramer {
            buf: BytesMut::with_capacity(256),
            max_line,
            pair: None,
        }
    }

    /// Append raw bytes read from the port.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Extract the next complete line, without its delimiter.
    ///
    /// Returns `None` when no complete line is buffered yet. Non-UTF-8 bytes
    /// are replaced rather than rejected so one noisy byte cannot stall the
    /// stream.
    pub fn next_line(&mut self) -> Option<String> {
        if let (Some(pair), Some(&first)) = (self.pair, self.buf.first()) {
            if first == pair {
                self.buf.advance(1);
            }
            self.pair = None;
        }

        let Some(pos) = self.buf.iter().position(|&b| b == b'\r' || b == b'\n') else {
            if self.buf.len() > self.max_line {
                warn!(len = self.buf.len(), "line buffer overflow, resetting");
                self.buf.clear();
            }
            return None;
        };

        let line = self.buf.split_to(pos);
        let delimiter = self.buf[0];
        self.buf.advance(1);
        let complement = if delimiter == b'\r' { b'\n' } else { b'\r' };
        match self.buf.first() {
            Some(&next) if next == complement => self.buf.advance(1),
            Some(_) => {}
            None => self.pair = Some(complement),
        }

        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(MAX_LINE)
    }
}
