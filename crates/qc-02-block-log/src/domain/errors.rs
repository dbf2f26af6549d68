//! # Domain Errors
//!
//! Error types for the block log.
//!
//! ## Design Principles
//!
//! - I/O failures and decompression failures are separate variants: the first
//!   means the bytes could not be read, the second means they were read but
//!   are not a valid block.
//! - Probing past the head is not an error; reads return `None` instead.

use std::io;
use std::path::PathBuf;

use shared_types::CodecError;
use thiserror::Error;

/// Errors from compressing or decompressing a block payload.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// The encoder rejected the input or its parameters.
    #[error("Compression failed: {0}")]
    CompressFailed(io::Error),

    /// The decoder rejected the frame.
    #[error("Decompression failed: {0}")]
    DecompressFailed(io::Error),

    /// No dictionary is registered under this number.
    #[error("Unknown compression dictionary {0}")]
    UnknownDictionary(u8),

    /// The frame ends before its declared content.
    #[error("Compressed data is truncated")]
    Truncated,

    /// The frame header is malformed or carries no content size.
    #[error("Compressed data appears corrupted")]
    CorruptedData,

    /// Declared content exceeds the decompression limit.
    #[error("Decompressed size {size} exceeds limit {limit}")]
    DecompressedTooLarge { size: u64, limit: u64 },
}

/// Errors that can occur during block log operations.
#[derive(Debug, Error)]
pub enum BlockLogError {
    /// Underlying file operation failed.
    #[error("Block log I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation on a log that is not open.
    #[error("Block log is not open")]
    NotOpen,

    /// Another process holds the log.
    #[error("Block log locked: {message}")]
    Locked { message: String },

    /// File contents do not form a valid record chain.
    #[error("Block log corrupted: {message}")]
    Corrupted { message: String },

    /// Blocks must be appended in order without gaps.
    #[error("Non-sequential block: expected #{expected}, got #{actual}")]
    NonSequentialBlock { expected: u32, actual: u32 },

    /// Record offset does not fit in 48 bits.
    #[error("Offset {offset} exceeds the 48-bit position range")]
    OffsetOutOfRange { offset: u64 },

    /// Block (de)serialization failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Payload could not be (de)compressed.
    #[error(transparent)]
    Compression(#[from] CompressionError),

    /// Block log is opened read-only.
    #[error("Block log {} is opened read-only", path.display())]
    ReadOnly { path: PathBuf },
}

impl BlockLogError {
    pub(crate) fn corrupted(message: impl Into<String>) -> Self {
        BlockLogError::Corrupted {
            message: message.into(),
        }
    }
}
