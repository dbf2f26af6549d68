//! # File Manager
//!
//! Owns the primary file and both indexes as one unit and brings them into
//! agreement when the log is opened.
//!
//! ## Open sequence
//!
//! 1. Take the process lock (writable opens only)
//! 2. Open `<path>`, `<path>.index`, `<path>.hash_index`
//! 3. Read the head through the primary file's trailing word; if that fails
//!    the tail was torn by a crash and is cut back to the last whole record
//! 4. Truncate indexes that run past the head, rebuild indexes that lag it
//! 5. Publish the head to the in-memory cache

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shared_types::{BlockId, PublicKey, SignedBlock, MAX_BLOCK_SIZE};

use crate::adapters::{BlockLogFile, BlockLogIndex, HashIndex, HeadBlock, HASH_ENTRY_SIZE};
#[cfg(feature = "locking")]
use crate::adapters::BlockLogLock;
use crate::domain::compression::{BlockCompressor, DecompressionContext};
use crate::domain::config::BlockLogConfig;
use crate::domain::errors::{BlockLogError, CompressionError};
use crate::domain::position::{BlockAttributes, PositionWord, POSITION_WORD_SIZE};

/// Decode a stored payload into a block.
pub(crate) fn decode_block(
    compressor: &BlockCompressor,
    bytes: &[u8],
    attributes: BlockAttributes,
    context: Option<&mut DecompressionContext>,
) -> Result<SignedBlock, BlockLogError> {
    let serialized = compressor.decode_payload(bytes, attributes, context)?;
    Ok(SignedBlock::from_bytes(&serialized)?)
}

/// Errors that mean "these bytes are not a record" rather than "the disk failed".
///
/// A missing dictionary is a configuration problem and never triggers repair.
fn is_format_error(err: &BlockLogError) -> bool {
    match err {
        BlockLogError::Compression(CompressionError::UnknownDictionary(_)) => false,
        BlockLogError::Corrupted { .. }
        | BlockLogError::Codec(_)
        | BlockLogError::Compression(_)
        | BlockLogError::OffsetOutOfRange { .. } => true,
        BlockLogError::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
        _ => false,
    }
}

/// The primary file, its two indexes, and the process lock.
pub struct FileManager {
    block_log_file: BlockLogFile,
    block_log_idx: BlockLogIndex,
    hash_idx: HashIndex,
    compressor: BlockCompressor,
    #[cfg(feature = "locking")]
    _lock: Option<BlockLogLock>,
}

impl FileManager {
    /// Path of the position index for a block log.
    pub fn index_path(block_log: &Path) -> PathBuf {
        let mut name = block_log.as_os_str().to_os_string();
        name.push(".index");
        PathBuf::from(name)
    }

    /// Path of the hash index for a block log.
    pub fn hash_index_path(block_log: &Path) -> PathBuf {
        let mut name = block_log.as_os_str().to_os_string();
        name.push(".hash_index");
        PathBuf::from(name)
    }

    /// Open (and in writable mode create) the three files.
    pub fn open(
        path: &Path,
        read_only: bool,
        config: &BlockLogConfig,
    ) -> Result<Self, BlockLogError> {
        #[cfg(feature = "locking")]
        let lock = if !read_only && config.lock {
            Some(BlockLogLock::acquire(path).map_err(|e| BlockLogError::Locked {
                message: e.to_string(),
            })?)
        } else {
            None
        };

        let block_log_file = BlockLogFile::open(path, read_only)?;
        let block_log_idx = BlockLogIndex::open(&Self::index_path(path), read_only)?;
        let hash_idx = HashIndex::open(&Self::hash_index_path(path), read_only)?;

        Ok(Self {
            block_log_file,
            block_log_idx,
            hash_idx,
            compressor: BlockCompressor::new(config.dictionaries.clone()),
            #[cfg(feature = "locking")]
            _lock: lock,
        })
    }

    pub fn block_log_file(&self) -> &BlockLogFile {
        &self.block_log_file
    }

    pub fn block_log_idx(&self) -> &BlockLogIndex {
        &self.block_log_idx
    }

    pub fn hash_idx(&self) -> &HashIndex {
        &self.hash_idx
    }

    pub fn compressor(&self) -> &BlockCompressor {
        &self.compressor
    }

    fn is_read_only(&self) -> bool {
        self.block_log_file.is_read_only()
    }

    /// Reconcile the files and load the head into the cache.
    pub fn prepare(&self) -> Result<(), BlockLogError> {
        let head = match self.read_head() {
            Ok(head) => head,
            Err(e) if is_format_error(&e) && !self.is_read_only() => {
                #[cfg(feature = "tracing-log")]
                tracing::warn!(
                    "[qc-02] ⚠️ Tail of {} is unreadable ({}), attempting repair",
                    self.block_log_file.path().display(),
                    e
                );
                self.recover_torn_tail()?
            }
            Err(e) => return Err(e),
        };

        match &head {
            Some(head) => self.reconcile_indexes(head)?,
            None if !self.is_read_only() => {
                if !self.block_log_idx.is_empty() || !self.hash_idx.is_empty() {
                    #[cfg(feature = "tracing-log")]
                    tracing::warn!("[qc-02] ⚠️ Block log is empty, discarding stale indexes");
                }
                self.block_log_idx.truncate(0)?;
                self.hash_idx.truncate(0)?;
            }
            None => {}
        }

        self.block_log_file.set_head(head);
        Ok(())
    }

    /// Head read straight from the primary file, bypassing the cache.
    ///
    /// Not safe to run concurrently with an append.
    pub fn read_head(&self) -> Result<Option<HeadBlock>, BlockLogError> {
        let Some(position) = self.block_log_file.trailing_word()? else {
            return Ok(None);
        };

        let record_end = self.block_log_file.size() - POSITION_WORD_SIZE;
        if position.offset() > record_end {
            return Err(BlockLogError::corrupted(format!(
                "head position {} lies past the end of the log ({})",
                position.offset(),
                record_end
            )));
        }
        let payload_len = record_end - position.offset();

        let (bytes, attributes) = self.block_log_file.read_record(position, payload_len)?;
        let block = decode_block(&self.compressor, &bytes, attributes, None)?;

        Ok(Some(HeadBlock {
            block: Arc::new(block),
            position,
            payload_len,
        }))
    }

    /// Decode `block_num` through the position index.
    ///
    /// `None` when the block (or its successor entry) is not indexed, and
    /// for `head_num` itself.
    pub fn read_block_from_index(
        &self,
        block_num: u32,
        head_num: u32,
        context: Option<&mut DecompressionContext>,
    ) -> Result<Option<SignedBlock>, BlockLogError> {
        let Some(entry) = self.block_log_idx.read(block_num, head_num)? else {
            return Ok(None);
        };
        let (bytes, attributes) = self
            .block_log_file
            .read_record(entry.position, entry.payload_len())?;
        decode_block(&self.compressor, &bytes, attributes, context).map(Some)
    }

    /// Bring both indexes in line with `head`.
    fn reconcile_indexes(&self, head: &HeadBlock) -> Result<(), BlockLogError> {
        let head_num = head.block_num();

        if self.is_read_only() {
            if self.block_log_idx.len() < head_num || self.hash_idx.len() < head_num {
                #[cfg(feature = "tracing-log")]
                tracing::warn!(
                    "[qc-02] ⚠️ Indexes lag the head (#{}) and the log is read-only; unindexed blocks will read as absent",
                    head_num
                );
            }
            return Ok(());
        }

        // position index
        let idx = &self.block_log_idx;
        if idx.len() > head_num || idx.size() % POSITION_WORD_SIZE != 0 {
            idx.truncate(idx.len().min(head_num))?;
        }
        if idx.read_word(head_num)? != Some(head.position) {
            idx.construct_index(&self.block_log_file, head_num, head.position, true)?;
        }

        // hash index
        let hash = &self.hash_idx;
        if hash.len() > head_num || hash.size() % HASH_ENTRY_SIZE != 0 {
            hash.truncate(hash.len().min(head_num))?;
        }
        let head_id = head.block.id();
        if hash.read_data_by_num(head_num)?.0 != Some(head_id) {
            let mut context = DecompressionContext::new();
            hash.construct_index(head_num, true, |block_num| {
                if block_num == head_num {
                    return Ok((head_id, head.block.signee()));
                }
                self.identity_from_log(block_num, head_num, &mut context)
            })?;
        }

        Ok(())
    }

    fn identity_from_log(
        &self,
        block_num: u32,
        head_num: u32,
        context: &mut DecompressionContext,
    ) -> Result<(BlockId, PublicKey), BlockLogError> {
        let block = self
            .read_block_from_index(block_num, head_num, Some(context))?
            .ok_or_else(|| {
                BlockLogError::corrupted(format!("block #{} missing from the position index", block_num))
            })?;
        if block.block_num() != block_num {
            return Err(BlockLogError::corrupted(format!(
                "index entry #{} points at block #{}",
                block_num,
                block.block_num()
            )));
        }
        Ok((block.id(), block.signee()))
    }

    /// Cut a torn final record off the primary file.
    ///
    /// The last indexed block anchors the search. From there every following
    /// record is located by its own trailing word and decoded, so blocks the
    /// index never caught up with survive; the file is cut after the last one
    /// that decodes. If the anchor block itself is incomplete it is dropped and
    /// the log ends with its predecessor.
    fn recover_torn_tail(&self) -> Result<Option<HeadBlock>, BlockLogError> {
        let indexed = self.block_log_idx.len();
        let Some(anchor) = self.block_log_idx.read_word(indexed)? else {
            return Err(BlockLogError::corrupted(
                "tail of the block log is unreadable and there is no index entry to recover from",
            ));
        };

        let size = self.block_log_file.size();
        if anchor.offset() > size {
            return Err(BlockLogError::corrupted(format!(
                "last index entry #{} points past the end of the log",
                indexed
            )));
        }

        let mut head = None;
        let mut block_num = indexed;
        let mut end = anchor.offset();
        while let Some(found) = self.find_record_end(block_num, end, size)? {
            end = found.position.offset() + found.payload_len + POSITION_WORD_SIZE;
            block_num += 1;
            head = Some(found);
        }

        if let Some(head) = head {
            #[cfg(feature = "tracing-log")]
            tracing::warn!(
                "[qc-02] ✂️ Discarding {} torn bytes after block #{} ({} blocks past the index)",
                size - end,
                head.block_num(),
                head.block_num() - indexed
            );
            self.block_log_file.truncate(end)?;
            self.hash_idx.truncate(self.hash_idx.len().min(head.block_num()))?;
            return Ok(Some(head));
        }

        #[cfg(feature = "tracing-log")]
        tracing::warn!(
            "[qc-02] ✂️ Block #{} is incomplete, truncating the log to block #{}",
            indexed,
            indexed - 1
        );
        self.block_log_file.truncate(anchor.offset())?;
        self.block_log_idx.truncate(indexed - 1)?;
        self.hash_idx.truncate(self.hash_idx.len().min(indexed - 1))?;
        self.read_head()
    }

    fn find_record_end(
        &self,
        block_num: u32,
        start: u64,
        size: u64,
    ) -> Result<Option<HeadBlock>, BlockLogError> {
        let found = locate_record(&self.block_log_file, &self.compressor, start, size, Some(block_num))?;
        Ok(found.map(|(block, position, payload_len)| HeadBlock {
            block: Arc::new(block),
            position,
            payload_len,
        }))
    }
}

/// Find the record that starts at `start` without any index: search for a
/// position word pointing back at `start` whose preceding bytes decode to a
/// block (to `block_num`, when given).
///
/// Returns the block, its word and the stored payload length. A record
/// needing an unregistered dictionary is an error, not a miss.
pub(crate) fn locate_record(
    log: &BlockLogFile,
    compressor: &BlockCompressor,
    start: u64,
    size: u64,
    block_num: Option<u32>,
) -> Result<Option<(SignedBlock, PositionWord, u64)>, BlockLogError> {
    let word_len = POSITION_WORD_SIZE as usize;
    let window = size.saturating_sub(start).min(MAX_BLOCK_SIZE + POSITION_WORD_SIZE);
    if window < POSITION_WORD_SIZE {
        return Ok(None);
    }
    let region = log.read_at(start, window as usize)?;
    let offset_bytes = start.to_le_bytes();

    for payload_len in 0..=(region.len() - word_len) {
        let candidate = &region[payload_len..payload_len + word_len];
        // low 48 bits carry the offset
        if candidate[..6] != offset_bytes[..6] {
            continue;
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(candidate);
        let Ok(position) = PositionWord::from_le_bytes(word) else {
            continue;
        };

        match decode_block(compressor, &region[..payload_len], position.attributes(), None) {
            Ok(block) if block_num.map_or(true, |n| block.block_num() == n) => {
                return Ok(Some((block, position, payload_len as u64)));
            }
            Err(e @ BlockLogError::Compression(CompressionError::UnknownDictionary(_))) => {
                return Err(e)
            }
            _ => continue,
        }
    }
    Ok(None)
}
