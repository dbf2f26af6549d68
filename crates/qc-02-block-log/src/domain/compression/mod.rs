//! # Compression Module
//!
//! Dictionary-based Zstd compression for block log records.

mod codec;
mod dictionary;
pub mod security;


// Re-export public types
pub use codec::{
    BlockCompressor, CompressionContext, DecompressionContext, DEFAULT_COMPRESSION_LEVEL,
};
pub use dictionary::{DictionaryRegistry, BLOCKS_PER_DICTIONARY};
