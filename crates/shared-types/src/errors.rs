//! # Error Types
//!
//! Defines error types used across subsystems.

use thiserror::Error;

/// Errors from encoding or decoding a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Block could not be encoded.
    #[error("Block encoding failed: {0}")]
    Encode(String),

    /// Bytes do not form exactly one valid block.
    #[error("Block decoding failed: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::Decode("unexpected end of input".to_string());
        assert_eq!(err.to_string(), "Block decoding failed: unexpected end of input");
    }
}
