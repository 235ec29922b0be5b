//! Transport error types

use std::time::Duration;

use flitterbytes::CodecError;
use thiserror::Error;

/// Errors raised while moving frames between nodes
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("Connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Bad frame header: {0}")]
    Header(#[from] CodecError),

    #[error("Bad frame body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected frame: {0}")]
    UnexpectedFrame(String),

    #[error("Connection closed before a reply arrived")]
    Closed,

    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Check if retrying against the same peer could help
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectTimeout { .. }
                | TransportError::Connect { .. }
                | TransportError::Timeout(_)
                | TransportError::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_too_large_message() {
        let err = TransportError::FrameTooLarge { size: 70000, max: 65536 };
        let msg = err.to_string();
        assert!(msg.contains("70000"));
        assert!(msg.contains("65536"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(TransportError::Closed.is_retryable());
        assert!(!TransportError::FrameTooLarge { size: 2, max: 1 }.is_retryable());
        assert!(!TransportError::Rejected("busy".to_string()).is_retryable());
    }
}
