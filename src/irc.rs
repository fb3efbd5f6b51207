//! Tokio codec turning an IRC byte stream into [`Message`]s and back.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::error::{MessageParseError, ProtocolError};
use crate::line::LineCodec;
use crate::message::Message;

/// Message-level codec built on [`LineCodec`].
///
/// Blank lines are skipped. Lines that fail to parse, run over the length
/// limit or are not valid UTF-8 are logged and skipped, so one bad line
/// does not end the stream. Only I/O errors are returned.
#[derive(Debug, Clone, Default)]
pub struct IrcCodec {
    inner: LineCodec,
}

impl IrcCodec {
    /// Create a codec with the default line limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with a custom line limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            inner: LineCodec::with_max_len(max_len),
        }
    }

    fn accept(line: String) -> Option<Message> {
        match Message::parse(&line) {
            Ok(message) => {
                trace!(line = %line, "decoded line");
                Some(message)
            }
            Err(MessageParseError::EmptyMessage) => None,
            Err(cause) => {
                let err = ProtocolError::InvalidMessage {
                    string: line,
                    cause,
                };
                warn!(error = %err, "skipping unparseable line");
                None
            }
        }
    }

    /// The line codec has already consumed the offending bytes.
    fn skip(err: ProtocolError) -> Result<(), ProtocolError> {
        match err {
            ProtocolError::MessageTooLong { .. } | ProtocolError::Decode(_) => {
                warn!(error = %err, "skipping unreadable line");
                Ok(())
            }
            other => Err(other),
        }
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        loop {
            match self.inner.decode(src) {
                Ok(Some(line)) => {
                    if let Some(message) = Self::accept(line) {
                        return Ok(Some(message));
                    }
                }
                Ok(None) => return Ok(None),
                Err(err) => Self::skip(err)?,
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        loop {
            match self.inner.decode_eof(src) {
                Ok(Some(line)) => {
                    if let Some(message) = Self::accept(line) {
                        return Ok(Some(message));
                    }
                }
                Ok(None) => return Ok(None),
                Err(err) => Self::skip(err)?,
            }
        }
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        self.inner.encode(message.to_line().as_str(), dst)
    }
}
