//! # Position Index
//!
//! One position word per block, at byte `8 * (block_num - 1)`:
//!
//! ```text
//! +-------+-------+-----+------------+
//! | Pos 1 | Pos 2 | ... | Pos (head) |
//! +-------+-------+-----+------------+
//! ```
//!
//! The size of a record is the distance to the next entry, so every block
//! except the head can be read with two positional reads. The head has no
//! successor entry and is served from the in-memory cache instead.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::block_log_file::BlockLogFile;
use super::file_operation::{read_exact_at, write_all_at};
use crate::domain::errors::BlockLogError;
use crate::domain::position::{BlockAttributes, PositionWord, POSITION_WORD_SIZE};

/// Location of one record resolved through the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub position: PositionWord,
    /// Distance to the next record, including this record's trailing word.
    pub record_size: u64,
}

impl IndexEntry {
    /// Stored payload length, excluding the trailing word.
    pub fn payload_len(&self) -> u64 {
        self.record_size - POSITION_WORD_SIZE
    }
}

/// Position index file.
pub struct BlockLogIndex {
    path: PathBuf,
    file: File,
    read_only: bool,
    size: AtomicU64,
}

fn entry_offset(block_num: u32) -> u64 {
    (block_num as u64 - 1) * POSITION_WORD_SIZE
}

/// Map a short positional read to `None`.
fn eof_as_none<T>(result: io::Result<T>) -> Result<Option<T>, BlockLogError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl BlockLogIndex {
    pub fn open(path: &Path, read_only: bool) -> Result<Self, BlockLogError> {
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .create(!read_only)
            .open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            read_only,
            size: AtomicU64::new(size),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte length of the file.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Number of complete entries.
    pub fn len(&self) -> u32 {
        (self.size() / POSITION_WORD_SIZE) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_writable(&self) -> Result<(), BlockLogError> {
        if self.read_only {
            return Err(BlockLogError::ReadOnly {
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    /// Append the entry for the next block.
    pub fn append(&self, position: PositionWord) -> Result<(), BlockLogError> {
        self.ensure_writable()?;
        let size = self.size();
        write_all_at(&self.file, &position.to_le_bytes(), size)?;
        self.size.store(size + POSITION_WORD_SIZE, Ordering::Release);
        Ok(())
    }

    /// Raw entry for `block_num`, `None` if not indexed.
    pub fn read_word(&self, block_num: u32) -> Result<Option<PositionWord>, BlockLogError> {
        if block_num == 0 {
            return Ok(None);
        }
        let bytes = match eof_as_none(read_exact_at(
            &self.file,
            entry_offset(block_num),
            POSITION_WORD_SIZE as usize,
        ))? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes);
        PositionWord::from_le_bytes(word).map(Some)
    }

    /// Offset and size of `block_num`'s record.
    ///
    /// Needs the entry of `block_num + 1`; returns `None` for the head
    /// (`head_num`) and for anything not yet indexed.
    pub fn read(&self, block_num: u32, head_num: u32) -> Result<Option<IndexEntry>, BlockLogError> {
        let mut entries = self.read_entries(block_num, 1, head_num)?;
        Ok(entries.pop())
    }

    /// Entries for up to `count` blocks starting at `first`, in one read.
    ///
    /// Only entries up to the caller's `head_num` are read. Stops at the last
    /// block whose successor entry exists.
    pub fn read_entries(
        &self,
        first: u32,
        count: u32,
        head_num: u32,
    ) -> Result<Vec<IndexEntry>, BlockLogError> {
        if first == 0 || count == 0 || first > head_num {
            return Ok(Vec::new());
        }

        let start = entry_offset(first);
        let mut words = (count as u64 + 1).min((head_num - first) as u64 + 1);
        if words < 2 {
            return Ok(Vec::new());
        }

        let bytes = match read_exact_at(&self.file, start, (words * POSITION_WORD_SIZE) as usize) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                // index lags the head: read-only open of an unreconciled log
                let on_disk = self.file.metadata()?.len().saturating_sub(start) / POSITION_WORD_SIZE;
                words = words.min(on_disk);
                if words < 2 {
                    return Ok(Vec::new());
                }
                read_exact_at(&self.file, start, (words * POSITION_WORD_SIZE) as usize)?
            }
            Err(e) => return Err(e.into()),
        };

        let mut positions = Vec::with_capacity(words as usize);
        for chunk in bytes.chunks_exact(POSITION_WORD_SIZE as usize) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            positions.push(PositionWord::from_le_bytes(word)?);
        }

        positions
            .windows(2)
            .map(|pair| {
                let (current, next) = (pair[0], pair[1]);
                if next.offset() < current.offset() + POSITION_WORD_SIZE {
                    return Err(BlockLogError::corrupted(format!(
                        "index entries out of order: {} followed by {}",
                        current.offset(),
                        next.offset()
                    )));
                }
                Ok(IndexEntry {
                    position: current,
                    record_size: next.offset() - current.offset(),
                })
            })
            .collect()
    }

    /// Stored bytes for blocks `first..first + count`, excluding the head.
    ///
    /// The covered region of the primary file is read with a single call.
    pub fn read_raw_range(
        &self,
        log: &BlockLogFile,
        first: u32,
        count: u32,
        head_num: u32,
    ) -> Result<Vec<(Vec<u8>, BlockAttributes)>, BlockLogError> {
        let entries = self.read_entries(first, count, head_num)?;
        let (Some(head), Some(tail)) = (entries.first(), entries.last()) else {
            return Ok(Vec::new());
        };

        let base = head.position.offset();
        let end = tail.position.offset() + tail.record_size;
        let region = log.read_at(base, (end - base) as usize)?;

        Ok(entries
            .iter()
            .map(|entry| {
                let start = (entry.position.offset() - base) as usize;
                let stop = start + entry.payload_len() as usize;
                (region[start..stop].to_vec(), entry.position.attributes())
            })
            .collect())
    }

    /// Drop entries past `entries`.
    pub fn truncate(&self, entries: u32) -> Result<(), BlockLogError> {
        self.ensure_writable()?;
        let len = entries as u64 * POSITION_WORD_SIZE;
        self.file.set_len(len)?;
        self.size.store(len, Ordering::Release);
        Ok(())
    }

    /// Rebuild the index by walking the primary file back from the head.
    ///
    /// With `resume`, entries already present are trusted up to the point
    /// where the walk meets them; the word found there must equal the last
    /// persisted entry, otherwise the whole index is rebuilt.
    ///
    /// Returns the number of entries written.
    pub fn construct_index(
        &self,
        log: &BlockLogFile,
        head_num: u32,
        head_position: PositionWord,
        resume: bool,
    ) -> Result<u32, BlockLogError> {
        self.ensure_writable()?;

        let persisted = if resume { self.len().min(head_num) } else { 0 };

        #[cfg(feature = "tracing-log")]
        tracing::info!(
            "[qc-02] 🔧 Reconstructing {} from block #{} to #{}",
            self.path.display(),
            persisted + 1,
            head_num
        );

        self.file.set_len(head_num as u64 * POSITION_WORD_SIZE)?;
        self.size
            .store(head_num as u64 * POSITION_WORD_SIZE, Ordering::Release);

        let mut block_num = head_num;
        let mut word = Some(head_position);
        while block_num > persisted {
            let current = word.ok_or_else(|| {
                BlockLogError::corrupted(format!(
                    "record chain ends before block #{}",
                    block_num
                ))
            })?;
            write_all_at(&self.file, &current.to_le_bytes(), entry_offset(block_num))?;
            word = log.previous_word(current)?;
            block_num -= 1;
        }

        if persisted == 0 {
            if let Some(extra) = word {
                return Err(BlockLogError::corrupted(format!(
                    "record at offset {} precedes block #1",
                    extra.offset()
                )));
            }
        } else if self.read_word(persisted)? != word {
            #[cfg(feature = "tracing-log")]
            tracing::warn!(
                "[qc-02] ⚠️ Index entry #{} does not match the record chain, rebuilding {}",
                persisted,
                self.path.display()
            );
            return self.construct_index(log, head_num, head_position, false);
        }

        self.file.sync_all()?;

        #[cfg(feature = "tracing-log")]
        tracing::info!(
            "[qc-02] ✅ Indexed {} blocks into {}",
            head_num - persisted,
            self.path.display()
        );

        Ok(head_num - persisted)
    }
}
