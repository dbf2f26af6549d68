//! # Compression Security
//!
//! Limits applied before a frame is decompressed.
//!
//! ## Security Invariants
//!
//! - Output buffers are sized from the frame header, never from guesses
//! - Frames without a declared content size are rejected
//! - Declared sizes above [`MAX_DECOMPRESSED_SIZE`] are rejected before allocation

use crate::domain::errors::CompressionError;

/// Maximum decompressed size to prevent decompression bombs (100MB).
pub const MAX_DECOMPRESSED_SIZE: u64 = 100 * 1024 * 1024;

/// Output capacity for a zstd frame, read from its header.
///
/// A frame whose header is cut short is [`CompressionError::Truncated`];
/// anything that is not a zstd frame header is [`CompressionError::CorruptedData`].
pub fn declared_content_size(frame: &[u8]) -> Result<usize, CompressionError> {
    let header_len = frame_header_len(frame)?;
    if frame.len() < header_len {
        return Err(CompressionError::Truncated);
    }

    let declared = match zstd::zstd_safe::get_frame_content_size(frame) {
        Ok(Some(size)) => size,
        Ok(None) | Err(_) => return Err(CompressionError::CorruptedData),
    };

    if declared > MAX_DECOMPRESSED_SIZE {
        return Err(CompressionError::DecompressedTooLarge {
            size: declared,
            limit: MAX_DECOMPRESSED_SIZE,
        });
    }

    Ok(declared as usize)
}

/// Walk the block headers of a frame and fail if its last block (or its
/// checksum) lies past the end of `frame`.
///
/// Only headers are inspected; block contents are left to the decoder.
pub fn check_frame_complete(frame: &[u8]) -> Result<(), CompressionError> {
    let mut pos = frame_header_len(frame)?;

    loop {
        let Some(header) = frame.get(pos..pos + BLOCK_HEADER_SIZE) else {
            return Err(CompressionError::Truncated);
        };
        let header = u32::from(header[0]) | u32::from(header[1]) << 8 | u32::from(header[2]) << 16;
        let last = header & 1 == 1;
        let block_size = (header >> 3) as usize;
        let content_len = match (header >> 1) & 0b11 {
            BLOCK_RAW | BLOCK_COMPRESSED => block_size,
            BLOCK_RLE => 1,
            _ => return Err(CompressionError::CorruptedData),
        };

        pos += BLOCK_HEADER_SIZE + content_len;
        if pos > frame.len() {
            return Err(CompressionError::Truncated);
        }
        if last {
            break;
        }
    }

    if frame[FRAME_DESCRIPTOR_OFFSET] & CHECKSUM_FLAG != 0 {
        pos += CHECKSUM_SIZE;
    }
    if pos > frame.len() {
        return Err(CompressionError::Truncated);
    }
    Ok(())
}

/// Length of the frame header, checked against the magic number.
///
/// Sizes follow the frame header descriptor: optional window descriptor,
/// dictionary id and content size fields.
fn frame_header_len(frame: &[u8]) -> Result<usize, CompressionError> {
    let magic_len = ZSTD_MAGIC.len().min(frame.len());
    if frame[..magic_len] != ZSTD_MAGIC[..magic_len] {
        return Err(CompressionError::CorruptedData);
    }
    let Some(&descriptor) = frame.get(FRAME_DESCRIPTOR_OFFSET) else {
        return Err(CompressionError::Truncated);
    };

    let single_segment = descriptor & 0x20 != 0;
    let window_len = usize::from(!single_segment);
    let dictionary_id_len = [0, 1, 2, 4][usize::from(descriptor & 0b11)];
    let content_size_len = match descriptor >> 6 {
        0 => usize::from(single_segment),
        1 => 2,
        2 => 4,
        _ => 8,
    };
    Ok(FRAME_DESCRIPTOR_OFFSET + 1 + window_len + dictionary_id_len + content_size_len)
}

/// Little-endian `0xFD2FB528`.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
const FRAME_DESCRIPTOR_OFFSET: usize = 4;
const CHECKSUM_FLAG: u8 = 0x04;
const CHECKSUM_SIZE: usize = 4;
const BLOCK_HEADER_SIZE: usize = 3;
const BLOCK_RAW: u32 = 0;
const BLOCK_RLE: u32 = 1;
const BLOCK_COMPRESSED: u32 = 2;
