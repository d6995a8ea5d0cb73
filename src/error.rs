//! Error types for per-message compression negotiation and streaming.
//!
//! Errors fall into a handful of kinds with different propagation rules:
//! parse errors are absorbed by the server negotiator (the offending offer is
//! skipped), configuration and state errors are programming mistakes, and
//! stream errors must close the WebSocket connection with a status code.

use crate::message::CloseCode;
use thiserror::Error;

/// Result type alias for compression extension operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating or running a compression extension.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Malformed extension header, unknown or repeated parameter, or a value
    /// out of range.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An accept object violates the compatibility rules of its offer or response.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The compressed stream received from the peer is corrupt.
    #[error("Invalid compressed payload: {0}")]
    InvalidPayload(String),

    /// Decompressed message size exceeds the configured ceiling.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Decompressed size reached when the ceiling was crossed.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// A processor method was called out of order.
    #[error("Invalid state: {0}")]
    State(String),

    /// Unexpected failure inside a compressor.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Client-side negotiation failed; the opening handshake must be aborted.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Frame-level misuse of the compression bit.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The requested algorithm is not compiled into this build.
    #[error("Unsupported compression algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Parse`].
    Parse,
    /// See [`Error::Configuration`] and [`Error::UnsupportedAlgorithm`].
    Configuration,
    /// Runtime decompression failure, fatal to the connection.
    Stream,
    /// See [`Error::State`].
    State,
    /// See [`Error::Internal`].
    Internal,
    /// See [`Error::Handshake`].
    Handshake,
    /// See [`Error::ProtocolViolation`].
    Protocol,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(_) => ErrorKind::Parse,
            Error::Configuration(_) | Error::UnsupportedAlgorithm(_) => ErrorKind::Configuration,
            Error::InvalidPayload(_) | Error::MessageTooLarge { .. } => ErrorKind::Stream,
            Error::State(_) => ErrorKind::State,
            Error::Internal(_) => ErrorKind::Internal,
            Error::Handshake(_) => ErrorKind::Handshake,
            Error::ProtocolViolation(_) => ErrorKind::Protocol,
        }
    }

    /// The close status the framing layer should send when this error
    /// surfaces on an open connection.
    ///
    /// Returns `None` for errors that never occur on an open connection.
    #[must_use]
    pub const fn close_code(&self) -> Option<CloseCode> {
        match self {
            Error::InvalidPayload(_) => Some(CloseCode::InvalidPayload),
            Error::MessageTooLarge { .. } => Some(CloseCode::MessageTooBig),
            Error::ProtocolViolation(_) => Some(CloseCode::ProtocolError),
            Error::Internal(_) | Error::State(_) => Some(CloseCode::InternalError),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MessageTooLarge {
            size: 2_000_000,
            max: 1_000_000,
        };
        assert_eq!(
            err.to_string(),
            "Message too large: 2000000 bytes (max: 1000000)"
        );
        assert_eq!(
            Error::Parse("missing name".into()).to_string(),
            "Parse error: missing name"
        );
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::Parse(String::new()).kind(), ErrorKind::Parse);
        assert_eq!(
            Error::InvalidPayload(String::new()).kind(),
            ErrorKind::Stream
        );
        assert_eq!(
            Error::MessageTooLarge { size: 2, max: 1 }.kind(),
            ErrorKind::Stream
        );
        assert_eq!(
            Error::UnsupportedAlgorithm("permessage-bzip2".into()).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_close_codes() {
        assert_eq!(
            Error::InvalidPayload(String::new()).close_code(),
            Some(CloseCode::InvalidPayload)
        );
        assert_eq!(
            Error::MessageTooLarge { size: 2, max: 1 }
                .close_code()
                .map(|c| c.as_u16()),
            Some(1009)
        );
        assert_eq!(Error::Handshake(String::new()).close_code(), None);
        assert_eq!(Error::Parse(String::new()).close_code(), None);
    }

    #[test]
    fn test_error_clone() {
        let err = Error::State("start called twice".into());
        let cloned = err.clone();
        assert_eq!(err, cloned);
    }
}
