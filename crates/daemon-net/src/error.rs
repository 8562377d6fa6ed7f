//! Error types for the daemon networking layer.
//!
//! `DaemonError` covers everything a caller of this crate can see. Handshake
//! failures carry their own tagged `HandshakeError` so that callers and tests
//! can tell a bad token from a timeout without parsing messages.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the daemon networking layer.
#[derive(Debug, Error)]
pub enum DaemonError {
    // Transport errors
    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    // Proxy encoding errors
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Unsupported proxy format version {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    // Generic errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// Result type alias for daemon networking operations.
pub type Result<T> = std::result::Result<T, DaemonError>;

impl From<std::io::Error> for DaemonError {
    fn from(err: std::io::Error) -> Self {
        DaemonError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for DaemonError {
    fn from(err: serde_json::Error) -> Self {
        DaemonError::Serialization {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl DaemonError {
    /// Wrap an I/O failure on the proxy byte stream as a serialization error.
    pub fn serialization_io(err: std::io::Error) -> Self {
        DaemonError::Serialization {
            message: format!("proxy stream I/O failed: {}", err),
            source: None,
        }
    }
}

/// Why a handshake did not reach the established state.
///
/// The listener and connector report this instead of a bare boolean.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("no valid handshake received: {reason}")]
    ReceiveFailed { reason: String },

    #[error("could not send handshake: {reason}")]
    SendFailed { reason: String },

    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    #[error("accepting connection failed: {reason}")]
    AcceptFailed { reason: String },
}

impl HandshakeError {
    /// Short label for logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            HandshakeError::ReceiveFailed { .. } => "receive_failed",
            HandshakeError::SendFailed { .. } => "send_failed",
            HandshakeError::Timeout(_) => "timeout",
            HandshakeError::AcceptFailed { .. } => "accept_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let err: DaemonError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed").into();
        match err {
            DaemonError::Io { message, source } => {
                assert!(message.contains("pipe closed"));
                assert!(source.is_some());
            }
            other => panic!("Expected Io, got: {:?}", other),
        }
    }

    #[test]
    fn test_handshake_error_wraps_into_daemon_error() {
        let err: DaemonError = HandshakeError::Timeout(Duration::from_millis(200)).into();
        assert!(matches!(err, DaemonError::Handshake(HandshakeError::Timeout(_))));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_serialization_io_keeps_cause() {
        let err = DaemonError::serialization_io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated",
        ));
        assert!(matches!(err, DaemonError::Serialization { .. }));
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_handshake_error_kinds_are_distinct() {
        let kinds = [
            HandshakeError::ReceiveFailed { reason: String::new() }.kind(),
            HandshakeError::SendFailed { reason: String::new() }.kind(),
            HandshakeError::Timeout(Duration::ZERO).kind(),
            HandshakeError::AcceptFailed { reason: String::new() }.kind(),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
