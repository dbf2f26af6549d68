//! # Block Compression
//!
//! Dictionary-based Zstd compression for block log records.
//!
//! ## Algorithm
//!
//! 1. **Training**: dictionaries are trained offline per range of blocks
//! 2. **Write Path**: compress with the dictionary selected for the block
//! 3. **Read Path**: the dictionary number travels in the record's position
//!    word, so the reader always knows which dictionary to load
//!
//! Compression and decompression contexts are expensive to set up. Callers
//! that process many records (range reads, index reconstruction) keep one
//! [`CompressionContext`] / [`DecompressionContext`] alive across calls; the
//! output is identical with or without one.

use std::sync::Arc;

use super::dictionary::DictionaryRegistry;
use super::security::{check_frame_complete, declared_content_size};
use crate::domain::errors::CompressionError;
use crate::domain::position::{BlockAttributes, BlockFlags};

/// Compression level used when the caller does not choose one.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 15;

// =============================================================================
// REUSABLE CONTEXTS
// =============================================================================

/// Reusable zstd compression context.
///
/// Rebuilt only when the dictionary or level changes between calls.
#[derive(Default)]
pub struct CompressionContext {
    inner: Option<(zstd::bulk::Compressor<'static>, Option<u8>, i32)>,
}

impl CompressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn prepare(
        &mut self,
        dictionary_number: Option<u8>,
        dictionary: Option<&[u8]>,
        level: i32,
    ) -> Result<&mut zstd::bulk::Compressor<'static>, CompressionError> {
        let entry = match self.inner.take() {
            Some(entry) if entry.1 == dictionary_number && entry.2 == level => entry,
            _ => {
                let compressor = match dictionary {
                    Some(dict) => zstd::bulk::Compressor::with_dictionary(level, dict),
                    None => zstd::bulk::Compressor::new(level),
                }
                .map_err(CompressionError::CompressFailed)?;
                (compressor, dictionary_number, level)
            }
        };
        Ok(&mut self.inner.insert(entry).0)
    }
}

/// Reusable zstd decompression context.
#[derive(Default)]
pub struct DecompressionContext {
    inner: Option<(zstd::bulk::Decompressor<'static>, Option<u8>)>,
}

impl DecompressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn prepare(
        &mut self,
        dictionary_number: Option<u8>,
        dictionary: Option<&[u8]>,
    ) -> Result<&mut zstd::bulk::Decompressor<'static>, CompressionError> {
        let entry = match self.inner.take() {
            Some(entry) if entry.1 == dictionary_number => entry,
            _ => {
                let decompressor = match dictionary {
                    Some(dict) => zstd::bulk::Decompressor::with_dictionary(dict),
                    None => zstd::bulk::Decompressor::new(),
                }
                .map_err(CompressionError::DecompressFailed)?;
                (decompressor, dictionary_number)
            }
        };
        Ok(&mut self.inner.insert(entry).0)
    }
}

// =============================================================================
// ZSTD COMPRESSOR
// =============================================================================

/// Zstd codec backed by a dictionary registry.
#[derive(Debug, Clone, Default)]
pub struct BlockCompressor {
    dictionaries: Arc<DictionaryRegistry>,
}

impl BlockCompressor {
    pub fn new(dictionaries: DictionaryRegistry) -> Self {
        Self {
            dictionaries: Arc::new(dictionaries),
        }
    }

    pub fn dictionaries(&self) -> &DictionaryRegistry {
        &self.dictionaries
    }

    fn dictionary(&self, number: Option<u8>) -> Result<Option<&[u8]>, CompressionError> {
        match number {
            Some(n) => self
                .dictionaries
                .get(n)
                .map(Some)
                .ok_or(CompressionError::UnknownDictionary(n)),
            None => Ok(None),
        }
    }

    /// Compress serialized block bytes.
    pub fn compress(
        &self,
        data: &[u8],
        dictionary_number: Option<u8>,
        level: Option<i32>,
        context: Option<&mut CompressionContext>,
    ) -> Result<Vec<u8>, CompressionError> {
        let dictionary = self.dictionary(dictionary_number)?;
        let level = level.unwrap_or(DEFAULT_COMPRESSION_LEVEL);

        let mut local;
        let context = match context {
            Some(ctx) => ctx,
            None => {
                local = CompressionContext::new();
                &mut local
            }
        };

        context
            .prepare(dictionary_number, dictionary, level)?
            .compress(data)
            .map_err(CompressionError::CompressFailed)
    }

    /// Decompress a zstd frame produced by [`compress`](Self::compress).
    pub fn decompress(
        &self,
        data: &[u8],
        dictionary_number: Option<u8>,
        context: Option<&mut DecompressionContext>,
    ) -> Result<Vec<u8>, CompressionError> {
        let dictionary = self.dictionary(dictionary_number)?;
        let capacity = declared_content_size(data)?;

        let mut local;
        let context = match context {
            Some(ctx) => ctx,
            None => {
                local = DecompressionContext::new();
                &mut local
            }
        };

        // a frame that ends early is reported before zstd sees it
        check_frame_complete(data)?;

        let output = context
            .prepare(dictionary_number, dictionary)?
            .decompress(data, capacity)
            .map_err(CompressionError::DecompressFailed)?;

        if output.len() != capacity {
            return Err(CompressionError::CorruptedData);
        }
        Ok(output)
    }

    /// Decode a stored payload according to its attributes.
    pub fn decode_payload(
        &self,
        data: &[u8],
        attributes: BlockAttributes,
        context: Option<&mut DecompressionContext>,
    ) -> Result<Vec<u8>, CompressionError> {
        match attributes.flags {
            BlockFlags::Uncompressed => Ok(data.to_vec()),
            BlockFlags::Zstd => self.decompress(data, attributes.dictionary_number, context),
        }
    }
}
