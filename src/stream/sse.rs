//! Line-level SSE plumbing shared by the transcoder.
//!
//! Upstream bytes may arrive split at any position, including inside a UTF-8
//! sequence. Buffering works on raw bytes and only `\n` delimits lines, so a
//! split multi-byte character is simply carried to the next chunk.
use memchr::memchr_iter;

/// The terminal marker as emitted to clients, including the event separator.
pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

const COMPACT_THRESHOLD_BYTES: usize = 8 * 1024;

/// Incremental line splitter.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    read_offset: usize,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and hand every complete line to `on_line`.
    ///
    /// Lines are passed without their `\n` terminator and without a trailing
    /// `\r`. An incomplete trailing fragment stays buffered.
    pub fn feed(&mut self, chunk: &[u8], mut on_line: impl FnMut(&[u8])) {
        self.buffer.extend_from_slice(chunk);
        let scan_start = self.buffer.len() - chunk.len();
        let mut processed_up_to = self.read_offset;

        for rel_pos in memchr_iter(b'\n', &self.buffer[scan_start..]) {
            let line_end = scan_start + rel_pos;
            on_line(strip_cr(&self.buffer[processed_up_to..line_end]));
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2
                || self.read_offset >= COMPACT_THRESHOLD_BYTES);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Take the unterminated trailing fragment, if any, leaving the buffer empty.
    pub fn take_remainder(&mut self) -> Option<Vec<u8>> {
        if self.read_offset >= self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return None;
        }
        let mut rest = std::mem::take(&mut self.buffer);
        rest.drain(..self.read_offset);
        self.read_offset = 0;
        if rest.last() == Some(&b'\r') {
            rest.pop();
        }
        Some(rest)
    }

    /// Bytes waiting for a line terminator.
    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.buffer.len() - self.read_offset
    }
}

#[inline]
fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Payload of a `data:` line with one optional leading space removed.
#[must_use]
pub fn data_payload(line: &[u8]) -> Option<&[u8]> {
    let value = line.strip_prefix(b"data:")?;
    Some(value.strip_prefix(b" ").unwrap_or(value))
}

/// Whether a `data:` payload is the `[DONE]` terminal marker.
#[must_use]
pub fn is_done_payload(payload: &[u8]) -> bool {
    payload.trim_ascii() == b"[DONE]"
}

/// Append one `data: <json>` line (no blank-line separator).
pub fn push_data_line(out: &mut Vec<u8>, json: &[u8]) {
    out.reserve(json.len() + 7);
    out.extend_from_slice(b"data: ");
    out.extend_from_slice(json);
    out.push(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(buffer: &mut LineBuffer, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        buffer.feed(chunk, |line| lines.push(line.to_vec()));
        lines
    }

    #[test]
    fn test_splits_complete_lines() {
        let mut buffer = LineBuffer::new();
        let lines = collect(&mut buffer, b"data: a\n\ndata: b\n");
        assert_eq!(lines, vec![b"data: a".to_vec(), Vec::new(), b"data: b".to_vec()]);
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_fragment_waits_for_terminator() {
        let mut buffer = LineBuffer::new();
        assert!(collect(&mut buffer, b"data: {\"a\"").is_empty());
        assert_eq!(buffer.pending_len(), 10);
        let lines = collect(&mut buffer, b":1}\n");
        assert_eq!(lines, vec![b"data: {\"a\":1}".to_vec()]);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut buffer = LineBuffer::new();
        let lines = collect(&mut buffer, b"data: x\r\n\r\n");
        assert_eq!(lines, vec![b"data: x".to_vec(), Vec::new()]);
    }

    #[test]
    fn test_split_utf8_sequence_is_reassembled() {
        let text = "data: h\u{e9}llo\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let mut buffer = LineBuffer::new();
        assert!(collect(&mut buffer, &text[..split]).is_empty());
        let lines = collect(&mut buffer, &text[split..]);
        assert_eq!(lines, vec![b"data: h\xc3\xa9llo".to_vec()]);
    }

    #[test]
    fn test_take_remainder() {
        let mut buffer = LineBuffer::new();
        let _ = collect(&mut buffer, b"a\nbc\r");
        assert_eq!(buffer.take_remainder(), Some(b"bc".to_vec()));
        assert_eq!(buffer.take_remainder(), None);
    }

    #[test]
    fn test_data_payload_and_done() {
        assert_eq!(data_payload(b"data: x"), Some(&b"x"[..]));
        assert_eq!(data_payload(b"data:x"), Some(&b"x"[..]));
        assert_eq!(data_payload(b"event: x"), None);
        assert!(is_done_payload(b"[DONE]"));
        assert!(is_done_payload(b" [DONE] "));
        assert!(!is_done_payload(b"{}"));
    }
}
