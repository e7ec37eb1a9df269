//! # Error Types
//!
//! Error handling for the Yar server stack.
//!
//! Every fallible operation in the crate returns [`Result`], whose error is a
//! [`ProtocolError`]. Errors fall into three scopes, and callers decide what to
//! tear down based on that scope:
//!
//! ## Error Categories
//! - **Connection-fatal**: framing failures (bad body length, truncated frame) and
//!   socket I/O errors. The connection is closed, the listener keeps running.
//! - **Request-scoped**: unknown packager, body encode/decode failures, unknown
//!   sequence numbers, unknown methods. Reported to the client, the connection
//!   stays usable.
//! - **Listener-fatal**: non-temporary accept failures. The acceptor stops,
//!   established connections keep running.
//!
//! ## Example Usage
//! ```rust
//! use yar_protocol::error::{ProtocolError, Result};
//!
//! fn check_len(body_length: u32) -> Result<()> {
//!     if body_length < 8 {
//!         return Err(ProtocolError::InvalidBodyLength(body_length));
//!     }
//!     Ok(())
//! }
//!
//! let err = check_len(3).unwrap_err();
//! assert!(err.is_connection_fatal());
//! ```

use std::io;
use thiserror::Error;

use crate::protocol::envelope::StatusCode;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";

    /// Codec state errors
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";

    /// Packager errors
    pub const ERR_NULL_RESPONSE: &str = "yar: serverResponse null";
    pub const ERR_NO_PACKAGER: &str = "no packager resolved for this request";
    pub const ERR_ENVELOPE_NOT_MAP: &str = "request envelope must be a map";
}

/// ProtocolError is the primary error type for all Yar operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid body length in header: {0}")]
    InvalidBodyLength(u32),

    #[error("Body too large: {0} bytes")]
    OversizedBody(usize),

    #[error("Connection closed mid-frame: {0} bytes buffered")]
    IncompleteFrame(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Packager not found: {0}")]
    PackagerNotFound(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    #[error("invalid sequence number in response: {0}")]
    SequenceMismatch(String),

    #[error("Unrecognised message type: {0}")]
    UnexpectedMessage(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Listener error: {0}")]
    Listener(#[source] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether the error leaves the connection's byte stream unusable.
    ///
    /// Framing errors and socket I/O errors are fatal: the framing state can no
    /// longer be trusted, so the connection must be closed.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_)
                | ProtocolError::InvalidBodyLength(_)
                | ProtocolError::OversizedBody(_)
                | ProtocolError::IncompleteFrame(_)
                | ProtocolError::ConnectionClosed
                | ProtocolError::Listener(_)
        )
    }

    /// Status code reported to the client when this error fails a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProtocolError::PackagerNotFound(_)
            | ProtocolError::SerializeError(_)
            | ProtocolError::DeserializeError(_) => StatusCode::Packager,
            ProtocolError::SequenceMismatch(_) | ProtocolError::UnexpectedMessage(_) => {
                StatusCode::Protocol
            }
            ProtocolError::UnknownMethod(_) => StatusCode::Request,
            ProtocolError::Io(_)
            | ProtocolError::InvalidBodyLength(_)
            | ProtocolError::OversizedBody(_)
            | ProtocolError::IncompleteFrame(_)
            | ProtocolError::ConnectionClosed
            | ProtocolError::Listener(_) => StatusCode::Transport,
            ProtocolError::ConfigError(_) | ProtocolError::Custom(_) => StatusCode::Exception,
        }
    }
}

impl From<rmp_serde::encode::Error> for ProtocolError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        ProtocolError::SerializeError(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ProtocolError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        ProtocolError::DeserializeError(err.to_string())
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_errors_are_fatal() {
        assert!(ProtocolError::InvalidBodyLength(3).is_connection_fatal());
        assert!(ProtocolError::OversizedBody(3 * 1024 * 1024).is_connection_fatal());
        assert!(ProtocolError::IncompleteFrame(12).is_connection_fatal());
        assert!(ProtocolError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_connection_fatal());
    }

    #[test]
    fn test_request_errors_are_not_fatal() {
        assert!(!ProtocolError::PackagerNotFound("abcd".into()).is_connection_fatal());
        assert!(!ProtocolError::DeserializeError("bad".into()).is_connection_fatal());
        assert!(!ProtocolError::SequenceMismatch("9".into()).is_connection_fatal());
        assert!(!ProtocolError::UnknownMethod("nope".into()).is_connection_fatal());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ProtocolError::PackagerNotFound("abcd".into()).status_code(),
            StatusCode::Packager
        );
        assert_eq!(
            ProtocolError::UnknownMethod("x".into()).status_code(),
            StatusCode::Request
        );
        assert_eq!(
            ProtocolError::Custom("boom".into()).status_code(),
            StatusCode::Exception
        );
    }

    #[test]
    fn test_sequence_mismatch_message() {
        let err = ProtocolError::SequenceMismatch("17".into());
        assert_eq!(err.to_string(), "invalid sequence number in response: 17");
    }
}
