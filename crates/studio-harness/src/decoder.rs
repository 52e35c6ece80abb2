/// Splits a chunked byte stream into lines.
///
/// Chunk boundaries rarely line up with line boundaries, so the unterminated
/// tail of each chunk is held back until its newline arrives. Buffering raw
/// bytes also keeps multi-byte UTF-8 sequences split across chunks intact.
#[derive(Default)]
pub(crate) struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    /// Appends a chunk and returns every line it completed, without the
    /// terminating `\n` / `\r\n`.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let Some(last_newline) = self.buf.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.buf.drain(..=last_newline).collect();
        complete[..complete.len() - 1]
            .split(|b| *b == b'\n')
            .map(decode_line)
            .collect()
    }

    /// Returns the unterminated tail once the transport has closed.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(decode_line(&rest))
    }

    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
