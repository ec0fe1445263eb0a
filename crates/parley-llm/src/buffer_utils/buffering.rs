use anyhow::Result;
use std::collections::VecDeque;

/// Circular buffer for line-based parsing of chunked HTTP bodies
///
/// Network chunks do not respect line boundaries, so bytes are accumulated
/// here and complete lines drained out as they become available.
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
}

impl CircularLineBuffer {
    /// Create a new buffer with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    /// Add bytes to the buffer
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Extract next line (up to \n) from buffer
    /// Returns None if no complete line is available
    pub fn next_line(&mut self) -> Option<Result<String>> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();

        Some(decode_line(&line_bytes))
    }

    /// Drain whatever is left after the body ended without a trailing newline
    pub fn take_remaining(&mut self) -> Option<Result<String>> {
        if self.buffer.is_empty() {
            return None;
        }
        let line_bytes: Vec<u8> = self.buffer.drain(..).collect();

        Some(decode_line(&line_bytes))
    }

    /// Current buffer size
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> Result<String> {
    match std::str::from_utf8(bytes) {
        Ok(line_str) => Ok(line_str.trim().to_string()),
        Err(e) => Err(anyhow::anyhow!("Invalid UTF-8: {}", e)),
    }
}
