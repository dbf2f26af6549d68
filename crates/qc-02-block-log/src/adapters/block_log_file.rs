//! # Primary Log File
//!
//! The append-only file of block records. It is the only file that has to
//! survive; both indexes are rebuilt from it.
//!
//! ```text
//! +---------+-------+---------+-------+-----+------------+------------+
//! | Block 1 | Pos 1 | Block 2 | Pos 2 | ... | Head Block | Pos (head) |
//! +---------+-------+---------+-------+-----+------------+------------+
//! ```
//!
//! The file can be walked backwards without any index: the last 8 bytes are
//! the head record's position word, and the 8 bytes in front of any record
//! are the previous record's word.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::SignedBlock;

use super::file_operation::{read_exact_at, read_u64_at, write_with_retry};
use crate::domain::errors::BlockLogError;
use crate::domain::position::{BlockAttributes, PositionWord, POSITION_WORD_SIZE};

/// The cached head: the block plus where its record lives.
#[derive(Debug, Clone)]
pub struct HeadBlock {
    pub block: Arc<SignedBlock>,
    pub position: PositionWord,
    /// Stored payload length, excluding the trailing word.
    pub payload_len: u64,
}

impl HeadBlock {
    pub fn block_num(&self) -> u32 {
        self.block.block_num()
    }
}

/// Handle on the primary file plus the in-memory head.
pub struct BlockLogFile {
    path: PathBuf,
    file: File,
    read_only: bool,
    /// Writer-owned; readers never consult it.
    size: AtomicU64,
    head: RwLock<Option<HeadBlock>>,
}

impl BlockLogFile {
    /// Open the primary file, creating it in writable mode.
    pub fn open(path: &Path, read_only: bool) -> Result<Self, BlockLogError> {
        let file = if read_only {
            OpenOptions::new().read(true).open(path)?
        } else {
            OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(path)?
        };
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            read_only,
            size: AtomicU64::new(size),
            head: RwLock::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Current byte length as tracked by the writer.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Append raw bytes at end-of-file.
    pub fn write(&self, bytes: &[u8]) -> Result<(), BlockLogError> {
        if self.read_only {
            return Err(BlockLogError::ReadOnly {
                path: self.path.clone(),
            });
        }
        write_with_retry(&mut &self.file, bytes)?;
        self.size.fetch_add(bytes.len() as u64, Ordering::AcqRel);
        Ok(())
    }

    /// Append `[payload][position word]` in a single write.
    ///
    /// Returns the word, whose offset is where the payload starts.
    pub fn append_record(
        &self,
        payload: &[u8],
        attributes: BlockAttributes,
    ) -> Result<PositionWord, BlockLogError> {
        let position = PositionWord::new(self.size(), attributes)?;

        let mut record = Vec::with_capacity(payload.len() + POSITION_WORD_SIZE as usize);
        record.extend_from_slice(payload);
        record.extend_from_slice(&position.to_le_bytes());
        self.write(&record)?;

        Ok(position)
    }

    /// Writes go straight to the file descriptor; there is nothing buffered to flush.
    pub fn flush(&self) {}

    /// Exactly `length` bytes at `offset`, or an I/O error.
    pub fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>, BlockLogError> {
        Ok(read_exact_at(&self.file, offset, length)?)
    }

    pub fn read_position_word_at(&self, offset: u64) -> Result<PositionWord, BlockLogError> {
        PositionWord::from_raw(read_u64_at(&self.file, offset)?)
    }

    /// Stored bytes of one record and how they are encoded.
    pub fn read_record(
        &self,
        position: PositionWord,
        payload_len: u64,
    ) -> Result<(Vec<u8>, BlockAttributes), BlockLogError> {
        let bytes = self.read_at(position.offset(), payload_len as usize)?;
        Ok((bytes, position.attributes()))
    }

    /// Position word of the last record, `None` for an empty file.
    pub fn trailing_word(&self) -> Result<Option<PositionWord>, BlockLogError> {
        let size = self.size();
        if size == 0 {
            return Ok(None);
        }
        if size < POSITION_WORD_SIZE {
            return Err(BlockLogError::corrupted(format!(
                "{} is {} bytes, shorter than one position word",
                self.path.display(),
                size
            )));
        }
        self.read_position_word_at(size - POSITION_WORD_SIZE).map(Some)
    }

    /// Word of the record in front of `position`, `None` at the first record.
    pub fn previous_word(
        &self,
        position: PositionWord,
    ) -> Result<Option<PositionWord>, BlockLogError> {
        let offset = position.offset();
        if offset == 0 {
            return Ok(None);
        }
        if offset < POSITION_WORD_SIZE {
            return Err(BlockLogError::corrupted(format!(
                "record at offset {} leaves no room for a preceding position word",
                offset
            )));
        }

        let previous = self.read_position_word_at(offset - POSITION_WORD_SIZE)?;
        if previous.offset() > offset - POSITION_WORD_SIZE {
            return Err(BlockLogError::corrupted(format!(
                "position chain goes forward: {} precedes {}",
                previous.offset(),
                offset
            )));
        }
        Ok(Some(previous))
    }

    /// Cut the file back to `len` bytes; only used to drop a torn tail.
    pub fn truncate(&self, len: u64) -> Result<(), BlockLogError> {
        if self.read_only {
            return Err(BlockLogError::ReadOnly {
                path: self.path.clone(),
            });
        }
        self.file.set_len(len)?;
        self.file.sync_all()?;
        self.size.store(len, Ordering::Release);
        Ok(())
    }

    /// Snapshot of the cached head.
    pub fn head(&self) -> Option<HeadBlock> {
        self.head.read().clone()
    }

    /// Publish a new head; returns the one it replaced.
    pub fn set_head(&self, head: Option<HeadBlock>) -> Option<HeadBlock> {
        std::mem::replace(&mut *self.head.write(), head)
    }
}
