//! Line framing for IRC byte streams.
//!
//! Splits a byte stream on LF, tolerating a missing CR, and writes lines
//! back out with CRLF.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Bytes reserved for IRCv3 message tags, including the leading `@` and
/// the trailing space.
pub const MAX_TAGS_LEN: usize = 8191;

/// Bytes allowed for the rest of a line, CRLF included (RFC 1459).
pub const MAX_MESSAGE_LEN: usize = 512;

/// Maximum line length in bytes, tags included.
pub const MAX_IRC_LINE_LEN: usize = MAX_TAGS_LEN + MAX_MESSAGE_LEN;

/// A line-based codec producing `String`s without their line ending.
///
/// A line over the limit or not valid UTF-8 is consumed and reported as
/// an error; decoding may continue with the next line afterwards.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_len: usize,
    next_index: usize,
    /// Dropping the tail of an over-long line until its newline.
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the default line limit.
    pub fn new() -> Self {
        Self::with_max_len(MAX_IRC_LINE_LEN)
    }

    /// Create a codec with a custom line limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len,
            next_index: 0,
            discarding: false,
        }
    }

    /// The configured line limit.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn into_line(bytes: BytesMut) -> Result<String, ProtocolError> {
    let mut line = String::from_utf8(bytes.to_vec())?;
    while line.ends_with(['\r', '\n']) {
        line.pop();
    }
    Ok(line)
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        loop {
            // Only scan bytes we have not looked at yet.
            let offset = src[self.next_index..].iter().position(|&b| b == b'\n');

            match (self.discarding, offset) {
                (true, Some(offset)) => {
                    src.advance(self.next_index + offset + 1);
                    self.next_index = 0;
                    self.discarding = false;
                }
                (true, None) => {
                    src.advance(src.len());
                    self.next_index = 0;
                    return Ok(None);
                }
                (false, Some(offset)) => {
                    let line = src.split_to(self.next_index + offset + 1);
                    self.next_index = 0;
                    if line.len() > self.max_len {
                        return Err(ProtocolError::MessageTooLong {
                            actual: line.len(),
                            limit: self.max_len,
                        });
                    }
                    return into_line(line).map(Some);
                }
                (false, None) => {
                    if src.len() > self.max_len {
                        let actual = src.len();
                        src.advance(actual);
                        self.next_index = 0;
                        self.discarding = true;
                        return Err(ProtocolError::MessageTooLong {
                            actual,
                            limit: self.max_len,
                        });
                    }
                    self.next_index = src.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            None => {
                // Unterminated final line.
                self.next_index = 0;
                let rest = src.split_to(src.len());
                into_line(rest).map(Some)
            }
        }
    }
}

impl Encoder<&str> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: &str, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
