//! Line buffer for accumulating partial reads of reply lines.
//!
//! Uses `bytes::BytesMut` for buffer management. Replies are
//! newline-terminated; a complete line shorter than [`MIN_HEADER_LEN`] is
//! treated as the front of a reply that was split across lines, and the
//! following lines are appended to it until the minimum is reached:
//!
//! - `Collecting`: no partial reply held
//! - `Joining`: holding a fragment shorter than the minimum header
//!
//! # Example
//!
//! ```
//! use agency_client::protocol::LineBuffer;
//!
//! let mut buffer = LineBuffer::new();
//! buffer.extend(b"|ack");
//! assert!(buffer.next_reply().unwrap().is_none());
//!
//! buffer.extend(b" 8\n|ack 2\n");
//! assert_eq!(buffer.next_reply().unwrap().as_deref(), Some("|ack 8"));
//! assert_eq!(buffer.next_reply().unwrap().as_deref(), Some("|ack 2"));
//! ```

use bytes::BytesMut;

use crate::error::{ClientError, Result};

/// Minimum length of a reply before it is handed to the decoder.
pub const MIN_HEADER_LEN: usize = 2;

/// Default maximum length of a single reply line (64 KB).
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// State machine for reply assembly.
#[derive(Debug, Clone)]
enum State {
    /// No fragment held.
    Collecting,
    /// A fragment shorter than the minimum header is held.
    Joining { partial: String },
}

/// Buffer for accumulating incoming bytes and extracting complete replies.
pub struct LineBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current assembly state.
    state: State,
    /// Maximum allowed length of one line.
    max_line_len: usize,
}

impl LineBuffer {
    /// Create a new line buffer with default settings.
    pub fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Create a new line buffer with a custom maximum line length.
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * 1024),
            state: State::Collecting,
            max_line_len,
        }
    }

    /// Append raw bytes read from the socket.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next complete reply.
    ///
    /// Returns:
    /// - `Ok(Some(text))` with the reply, terminator stripped
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` if a line exceeds the maximum length or is not UTF-8
    pub fn next_reply(&mut self) -> Result<Option<String>> {
        while let Some(line) = self.take_line()? {
            let text = match std::mem::replace(&mut self.state, State::Collecting) {
                State::Collecting => line,
                State::Joining { mut partial } => {
                    partial.push_str(&line);
                    partial
                }
            };

            if text.len() >= MIN_HEADER_LEN {
                return Ok(Some(text));
            }
            self.state = State::Joining { partial: text };
        }

        Ok(None)
    }

    /// Pop one newline-terminated line off the buffer.
    fn take_line(&mut self) -> Result<Option<String>> {
        let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
            if self.buffer.len() > self.max_line_len {
                return Err(ClientError::Protocol(format!(
                    "reply line exceeds maximum {} bytes",
                    self.max_line_len
                )));
            }
            return Ok(None);
        };

        let raw = self.buffer.split_to(pos + 1);
        let raw = &raw[..pos];
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

        String::from_utf8(raw.to_vec())
            .map(Some)
            .map_err(|e| ClientError::Protocol(format!("reply is not UTF-8: {}", e)))
    }

    /// Get the number of buffered bytes not yet assembled into a reply.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::Collecting;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::Collecting => "Collecting",
            State::Joining { .. } => "Joining",
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_line() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"|ack 8\n");

        assert_eq!(buffer.next_reply().unwrap().as_deref(), Some("|ack 8"));
        assert!(buffer.is_empty());
        assert!(buffer.next_reply().unwrap().is_none());
    }

    #[test]
    fn test_crlf_terminator() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"err full\r\n");
        assert_eq!(buffer.next_reply().unwrap().as_deref(), Some("err full"));
    }

    #[test]
    fn test_fragmented_line() {
        let mut buffer = LineBuffer::new();

        buffer.extend(b"|w");
        assert!(buffer.next_reply().unwrap().is_none());
        buffer.extend(b"in 5 1");
        assert!(buffer.next_reply().unwrap().is_none());
        buffer.extend(b"2\n");

        assert_eq!(buffer.next_reply().unwrap().as_deref(), Some("|win 5 12"));
    }

    #[test]
    fn test_short_line_is_joined_with_next() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"|\nack 3\n");

        assert_eq!(buffer.next_reply().unwrap().as_deref(), Some("|ack 3"));
        assert_eq!(buffer.state_name(), "Collecting");
    }

    #[test]
    fn test_empty_lines_are_absorbed() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"\n\n");
        assert!(buffer.next_reply().unwrap().is_none());
        assert_eq!(buffer.state_name(), "Joining");

        buffer.extend(b"|ack 1\n");
        assert_eq!(buffer.next_reply().unwrap().as_deref(), Some("|ack 1"));
    }

    #[test]
    fn test_multiple_lines_in_one_read() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"|win\n|win\n|win 7\n");

        assert_eq!(buffer.next_reply().unwrap().as_deref(), Some("|win"));
        assert_eq!(buffer.next_reply().unwrap().as_deref(), Some("|win"));
        assert_eq!(buffer.next_reply().unwrap().as_deref(), Some("|win 7"));
        assert!(buffer.next_reply().unwrap().is_none());
    }

    #[test]
    fn test_max_line_len() {
        let mut buffer = LineBuffer::with_max_line_len(8);
        buffer.extend(b"|ack 123456789");

        let err = buffer.next_reply().unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"x\npartial");
        assert!(buffer.next_reply().unwrap().is_none());
        assert_eq!(buffer.state_name(), "Joining");

        buffer.clear();
        assert_eq!(buffer.state_name(), "Collecting");
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = LineBuffer::new();
        let mut replies = Vec::new();

        for byte in b"|ack 8\n" {
            buffer.extend(&[*byte]);
            if let Some(reply) = buffer.next_reply().unwrap() {
                replies.push(reply);
            }
        }

        assert_eq!(replies, vec!["|ack 8".to_string()]);
    }
}
