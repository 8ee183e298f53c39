//! Error types for the notification sync subsystem.
//!
//! Three fault families exist and none is fatal:
//! - transport faults recover by reconnecting,
//! - decode faults drop the offending frame,
//! - remote faults surface to the user as a failure notice.

use thiserror::Error;

/// A push-channel payload could not be turned into a domain event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not JSON.
    #[error("frame is not valid JSON: {0}")]
    Malformed(String),

    /// JSON does not match the notification shape (missing or mistyped fields).
    #[error("frame does not match the notification shape: {0}")]
    Shape(String),

    /// JSON is neither an object nor an array.
    #[error("unexpected {0} frame")]
    Unexpected(&'static str),
}

impl DecodeError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "parse",
            Self::Shape(_) | Self::Unexpected(_) => "shape",
        }
    }
}

/// Push channel failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Endpoint answered with a non-success status.
    #[error("stream endpoint returned status {0}")]
    Status(u16),

    /// Established connection broke.
    #[error("stream error: {0}")]
    Stream(String),
}

/// Failures from the remote authority's REST interface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Request reached the server and was refused.
    #[error("remote authority rejected the request with status {status}")]
    Status { status: u16 },

    /// Request never got an answer.
    #[error("remote authority unreachable: {0}")]
    Unreachable(String),

    /// Client could not be built or the request was malformed locally.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Event stream client lifecycle errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamClientError {
    /// `disconnect()` has already run; the client cannot be reused.
    #[error("stream client is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reason_labels() {
        assert_eq!(DecodeError::Malformed("x".into()).reason(), "parse");
        assert_eq!(DecodeError::Shape("x".into()).reason(), "shape");
        assert_eq!(DecodeError::Unexpected("number").reason(), "shape");
    }

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::Status { status: 404 };
        assert!(err.to_string().contains("404"));
    }
}
