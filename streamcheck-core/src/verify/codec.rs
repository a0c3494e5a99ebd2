use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Longest player output line kept in full
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Line decoder for free-form player diagnostics.
///
/// Never fails on content: invalid UTF-8 is replaced, a trailing `\r` is
/// trimmed, and a line longer than `max_length` is cut to its first
/// `max_length` bytes while the rest of it is discarded.
#[derive(Debug, Clone)]
pub struct PlayerLineCodec {
    max_length: usize,
    /// Bytes already searched for a newline
    next_index: usize,
    /// Dropping the tail of an overlong line
    discarding: bool,
}

impl PlayerLineCodec {
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
            next_index: 0,
            discarding: false,
        }
    }
}

impl Default for PlayerLineCodec {
    fn default() -> Self {
        Self::new(MAX_LINE_LENGTH)
    }
}

fn decode_lossy(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for PlayerLineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        loop {
            let read_to = buf.len().min(self.max_length.saturating_add(1));
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| offset + self.next_index);

            match (self.discarding, newline) {
                (true, Some(idx)) => {
                    buf.advance(idx + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(idx)) => {
                    let line = buf.split_to(idx + 1);
                    self.next_index = 0;
                    return Ok(Some(decode_lossy(&line[..idx])));
                }
                (false, None) if buf.len() > self.max_length => {
                    let line = buf.split_to(self.max_length);
                    self.discarding = true;
                    self.next_index = 0;
                    return Ok(Some(decode_lossy(&line)));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }

        self.next_index = 0;
        if self.discarding || buf.is_empty() {
            buf.clear();
            self.discarding = false;
            return Ok(None);
        }

        let line = buf.split_to(buf.len());
        Ok(Some(decode_lossy(&line)))
    }
}
