//! Accumulates raw transport bytes and yields complete reply lines.

use tracing::trace;

/// Growing text accumulator over the raw byte stream.
///
/// `feed` appends decoded text; `next_line` pops complete CRLF- or
/// LF-terminated lines, keeping any trailing partial line for the next
/// read. No line length cap is enforced, so a server that never
/// terminates a line can grow this buffer without bound.
#[derive(Debug, Default)]
pub struct LineBuffer {
    text: String,
}

impl LineBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of bytes. A chunk that is not valid UTF-8 is
    /// dropped whole; previously buffered text is kept.
    pub fn feed(&mut self, bytes: &[u8]) {
        match std::str::from_utf8(bytes) {
            Ok(chunk) => self.text.push_str(chunk),
            Err(_) => trace!(len = bytes.len(), "dropped undecodable chunk"),
        }
    }

    /// Removes and returns the first terminator-delimited line, with the
    /// terminator excluded. Returns `None` when no complete line is
    /// buffered.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.text.find('\n')?;
        let rest = self.text.split_off(end + 1);
        let mut line = std::mem::replace(&mut self.text, rest);
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }

    /// The buffered text that does not yet form a complete line.
    #[must_use]
    pub fn remaining(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_crlf_lines() {
        let mut buffer = LineBuffer::new();
        buffer.feed(b"220 ready\r\n250 ok\r\n");
        assert_eq!(buffer.next_line().unwrap(), "220 ready");
        assert_eq!(buffer.next_line().unwrap(), "250 ok");
        assert!(buffer.next_line().is_none());
    }

    #[test]
    fn accepts_bare_lf() {
        let mut buffer = LineBuffer::new();
        buffer.feed(b"220 ready\n");
        assert_eq!(buffer.next_line().unwrap(), "220 ready");
    }

    #[test]
    fn keeps_partial_line_across_feeds() {
        let mut buffer = LineBuffer::new();
        buffer.feed(b"250-AUTH PL");
        assert!(buffer.next_line().is_none());
        buffer.feed(b"AIN LOGIN\r\n250 ");
        assert_eq!(buffer.next_line().unwrap(), "250-AUTH PLAIN LOGIN");
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.remaining(), "250 ");
    }

    #[test]
    fn undecodable_chunk_is_dropped_whole() {
        let mut buffer = LineBuffer::new();
        buffer.feed(b"220 rea");
        buffer.feed(&[0xff, 0xfe, 0xfd]);
        buffer.feed(b"dy\r\n");
        assert_eq!(buffer.next_line().unwrap(), "220 ready");
    }

    #[test]
    fn empty_line_is_yielded() {
        let mut buffer = LineBuffer::new();
        buffer.feed(b"\r\n250 ok\r\n");
        assert_eq!(buffer.next_line().unwrap(), "");
        assert_eq!(buffer.next_line().unwrap(), "250 ok");
    }

    proptest! {
        // Lines never contain a terminator, and lines + terminators +
        // residue reassemble exactly what was fed.
        #[test]
        fn lines_and_residue_reassemble_input(
            lines in proptest::collection::vec("[a-zA-Z0-9 .:-]{0,40}", 0..8),
            tail in "[a-zA-Z0-9 .:-]{0,20}",
            chunk_len in 1usize..16,
        ) {
            let mut input = String::new();
            for line in &lines {
                input.push_str(line);
                input.push_str("\r\n");
            }
            input.push_str(&tail);

            let mut buffer = LineBuffer::new();
            let mut popped = Vec::new();
            for chunk in input.as_bytes().chunks(chunk_len) {
                buffer.feed(chunk);
                while let Some(line) = buffer.next_line() {
                    prop_assert!(!line.contains('\n'));
                    prop_assert!(!line.contains('\r'));
                    popped.push(line);
                }
            }

            let mut rebuilt = String::new();
            for line in &popped {
                rebuilt.push_str(line);
                rebuilt.push_str("\r\n");
            }
            rebuilt.push_str(buffer.remaining());
            prop_assert_eq!(rebuilt, input);
        }
    }
}
