//! Codec error types

use thiserror::Error;

/// Errors raised while decoding a byte buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Buffer too short: needed {needed} bytes, got {got}")]
    ShortBuffer { needed: usize, got: usize },

    #[error("Invalid float length prefix: {0}")]
    BadFloatPrefix(u8),

    #[error("Field too long to encode: {len} bytes (max {max})")]
    TooLong { len: usize, max: usize },
}
