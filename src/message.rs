//! Application messages and the close codes compression failures map to.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::OpCode;

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000).
    #[default]
    Normal,
    /// Protocol error (1002). Misuse of the compression bit.
    ProtocolError,
    /// Invalid payload (1007). Corrupt compressed data or non-UTF-8 text.
    InvalidPayload,
    /// Message too big (1009). Decompressed size over the configured ceiling.
    MessageTooBig,
    /// Internal error (1011). Unexpected compressor failure.
    InternalError,
    /// Any other registered or application code.
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1002 => CloseCode::ProtocolError,
            1007 => CloseCode::InvalidPayload,
            1009 => CloseCode::MessageTooBig,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::ProtocolError => 1002,
            CloseCode::InvalidPayload => 1007,
            CloseCode::MessageTooBig => 1009,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }
}

/// A complete application data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A text message (UTF-8 encoded).
    Text(String),
    /// A binary message.
    Binary(Bytes),
}

impl Message {
    /// Create a text message.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Message::Binary(data.into())
    }

    /// Opcode of the first frame carrying this message.
    #[must_use]
    pub const fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
        }
    }

    /// Message payload as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Text(s) => s.as_bytes(),
            Message::Binary(b) => b,
        }
    }

    /// Build a message from a reassembled payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] if a text payload is not valid UTF-8,
    /// or [`Error::ProtocolViolation`] for a non-data opcode.
    pub fn from_payload(opcode: OpCode, payload: Vec<u8>) -> Result<Self> {
        match opcode {
            OpCode::Text => String::from_utf8(payload)
                .map(Message::Text)
                .map_err(|_| Error::InvalidPayload("text message is not valid UTF-8".into())),
            OpCode::Binary => Ok(Message::Binary(Bytes::from(payload))),
            other => Err(Error::ProtocolViolation(format!(
                "{other:?} cannot start a data message"
            ))),
        }
    }
}
