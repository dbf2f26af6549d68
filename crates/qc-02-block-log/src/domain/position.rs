//! # Position Word
//!
//! Every record in the block log, and every entry in the position index, is a
//! 64-bit word. The lower 48 bits are the byte offset of the record, the upper
//! 16 bits say how the record is stored:
//!
//! ```text
//! hi    lo|hi    lo|hi                                                  lo|
//! c......d|<-dict->|<--------------------- offset ---------------------->|
//! ```
//!
//! - `c`    - block flags (0 = uncompressed, 1 = zstd)
//! - `d`    - set when the record was compressed with a dictionary
//! - `dict` - dictionary number, meaningful only when `d` is set
//! - `.`    - unused, always zero

use crate::domain::errors::BlockLogError;

/// Width of one encoded position word.
pub const POSITION_WORD_SIZE: u64 = 8;

/// Largest representable record offset.
pub const MAX_OFFSET: u64 = (1 << 48) - 1;

const OFFSET_MASK: u64 = MAX_OFFSET;
const FLAGS_SHIFT: u32 = 63;
const HAS_DICTIONARY_SHIFT: u32 = 56;
const DICTIONARY_SHIFT: u32 = 48;
const UNUSED_MASK: u64 = 0x7E << 56;

/// How a record's payload is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockFlags {
    #[default]
    Uncompressed = 0,
    Zstd = 1,
}

/// Compression metadata for one stored block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockAttributes {
    pub flags: BlockFlags,
    pub dictionary_number: Option<u8>,
}

impl BlockAttributes {
    pub const fn uncompressed() -> Self {
        Self {
            flags: BlockFlags::Uncompressed,
            dictionary_number: None,
        }
    }

    pub const fn zstd(dictionary_number: Option<u8>) -> Self {
        Self {
            flags: BlockFlags::Zstd,
            dictionary_number,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags == BlockFlags::Zstd
    }
}

/// Packed offset + attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionWord(u64);

impl PositionWord {
    /// Pack an offset and its attributes.
    ///
    /// Fails if the offset does not fit in 48 bits.
    pub fn new(offset: u64, attributes: BlockAttributes) -> Result<Self, BlockLogError> {
        if offset > MAX_OFFSET {
            return Err(BlockLogError::OffsetOutOfRange { offset });
        }

        let mut word = offset;
        if attributes.flags == BlockFlags::Zstd {
            word |= 1 << FLAGS_SHIFT;
            if let Some(dictionary) = attributes.dictionary_number {
                word |= 1 << HAS_DICTIONARY_SHIFT;
                word |= (dictionary as u64) << DICTIONARY_SHIFT;
            }
        }
        Ok(Self(word))
    }

    /// Validate a raw word read from disk.
    pub fn from_raw(raw: u64) -> Result<Self, BlockLogError> {
        if raw & UNUSED_MASK != 0 {
            return Err(BlockLogError::Corrupted {
                message: format!("position word {:#018x} has unused bits set", raw),
            });
        }
        Ok(Self(raw))
    }

    pub fn from_le_bytes(bytes: [u8; 8]) -> Result<Self, BlockLogError> {
        Self::from_raw(u64::from_le_bytes(bytes))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn offset(&self) -> u64 {
        self.0 & OFFSET_MASK
    }

    pub fn flags(&self) -> BlockFlags {
        if (self.0 >> FLAGS_SHIFT) & 1 == 1 {
            BlockFlags::Zstd
        } else {
            BlockFlags::Uncompressed
        }
    }

    pub fn dictionary_number(&self) -> Option<u8> {
        let compressed = self.flags() == BlockFlags::Zstd;
        let has_dictionary = (self.0 >> HAS_DICTIONARY_SHIFT) & 1 == 1;
        if compressed && has_dictionary {
            Some(((self.0 >> DICTIONARY_SHIFT) & 0xFF) as u8)
        } else {
            None
        }
    }

    pub fn attributes(&self) -> BlockAttributes {
        BlockAttributes {
            flags: self.flags(),
            dictionary_number: self.dictionary_number(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncompressed_word_is_plain_offset() {
        let word = PositionWord::new(1234, BlockAttributes::uncompressed()).unwrap();

        assert_eq!(word.raw(), 1234);
        assert_eq!(word.offset(), 1234);
        assert_eq!(word.attributes(), BlockAttributes::uncompressed());
    }

    #[test]
    fn test_zstd_with_dictionary_layout() {
        let word = PositionWord::new(0xABCDEF, BlockAttributes::zstd(Some(0x2A))).unwrap();

        assert_eq!(word.raw(), (1 << 63) | (1 << 56) | (0x2A << 48) | 0xABCDEF);
        assert_eq!(word.offset(), 0xABCDEF);
        assert_eq!(word.flags(), BlockFlags::Zstd);
        assert_eq!(word.dictionary_number(), Some(0x2A));
    }

    #[test]
    fn test_zstd_without_dictionary() {
        let word = PositionWord::new(MAX_OFFSET, BlockAttributes::zstd(None)).unwrap();

        assert_eq!(word.offset(), MAX_OFFSET);
        assert_eq!(word.attributes(), BlockAttributes::zstd(None));
    }

    #[test]
    fn test_dictionary_ignored_when_uncompressed() {
        let attrs = BlockAttributes {
            flags: BlockFlags::Uncompressed,
            dictionary_number: Some(3),
        };
        let word = PositionWord::new(10, attrs).unwrap();

        assert_eq!(word.raw(), 10);
        assert_eq!(word.dictionary_number(), None);
    }

    #[test]
    fn test_offset_out_of_range_rejected() {
        let result = PositionWord::new(MAX_OFFSET + 1, BlockAttributes::uncompressed());

        assert!(matches!(
            result,
            Err(BlockLogError::OffsetOutOfRange { offset }) if offset == MAX_OFFSET + 1
        ));
    }

    #[test]
    fn test_unused_bits_rejected_on_read() {
        assert!(PositionWord::from_raw(1 << 60).is_err());
        assert!(PositionWord::from_raw((1 << 63) | (1 << 56) | 77).is_ok());
    }

    #[test]
    fn test_le_bytes_round_trip() {
        let word = PositionWord::new(99, BlockAttributes::zstd(Some(1))).unwrap();
        let decoded = PositionWord::from_le_bytes(word.to_le_bytes()).unwrap();

        assert_eq!(decoded, word);
    }
}
