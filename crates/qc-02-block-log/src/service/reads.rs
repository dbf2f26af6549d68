//! # Block Log Service - Read Path
//!
//! Every read first snapshots the cached head and never looks past it, so a
//! block whose append is still in flight is invisible. The head itself is
//! served from the cache: the position index has no successor entry to size
//! its record.

use std::collections::BTreeMap;
use std::sync::Arc;

use shared_types::{SignedBlock, SignedBlockHeader};

use super::file_manager::decode_block;
use super::BlockLog;
use crate::adapters::{BlockIdentity, HeadBlock};
use crate::domain::compression::DecompressionContext;
use crate::domain::errors::BlockLogError;
use crate::domain::position::BlockAttributes;

impl BlockLog {
    fn head_snapshot(&self) -> Result<Option<HeadBlock>, BlockLogError> {
        Ok(self.files()?.block_log_file().head())
    }

    /// Read one block.
    ///
    /// `None` for 0, past the head, on an empty log, and for blocks a
    /// read-only open could not index.
    pub fn read_block_by_num(&self, block_num: u32) -> Result<Option<SignedBlock>, BlockLogError> {
        let files = self.files()?;
        let Some(head) = self.head_snapshot()? else {
            return Ok(None);
        };
        if block_num == 0 || block_num > head.block_num() {
            return Ok(None);
        }
        if block_num == head.block_num() {
            return Ok(Some((*head.block).clone()));
        }
        files.read_block_from_index(block_num, head.block_num(), None)
    }

    /// Read only the signed header of one block.
    pub fn read_block_header_by_num(
        &self,
        block_num: u32,
    ) -> Result<Option<SignedBlockHeader>, BlockLogError> {
        let Some(head) = self.head_snapshot()? else {
            return Ok(None);
        };
        if block_num == head.block_num() {
            return Ok(Some(head.block.header.clone()));
        }
        let Some((bytes, attributes)) = self.read_raw_block_data_by_num(block_num)? else {
            return Ok(None);
        };
        let serialized = self
            .files()?
            .compressor()
            .decode_payload(&bytes, attributes, None)?;
        Ok(Some(SignedBlock::header_from_bytes(&serialized)?))
    }

    /// Read up to `count` consecutive blocks starting at `first`.
    ///
    /// All non-head records are fetched with one read of the primary file and
    /// decoded with a shared decompression context.
    pub fn read_block_range_by_num(
        &self,
        first: u32,
        count: u32,
    ) -> Result<Vec<SignedBlock>, BlockLogError> {
        let files = self.files()?;
        let Some(head) = self.head_snapshot()? else {
            return Ok(Vec::new());
        };
        let head_num = head.block_num();
        if first == 0 || count == 0 || first > head_num {
            return Ok(Vec::new());
        }

        let last = first.saturating_add(count - 1).min(head_num);
        let includes_head = last == head_num;
        let on_disk = if includes_head { last - first } else { last - first + 1 };

        let raw = files
            .block_log_idx()
            .read_raw_range(files.block_log_file(), first, on_disk, head_num)?;

        let mut context = DecompressionContext::new();
        let mut blocks = Vec::with_capacity((last - first + 1) as usize);
        for (i, (bytes, attributes)) in raw.into_iter().enumerate() {
            let expected = first + i as u32;
            let block = decode_block(files.compressor(), &bytes, attributes, Some(&mut context))?;
            if block.block_num() != expected {
                return Err(BlockLogError::corrupted(format!(
                    "index entry #{} points at block #{}",
                    expected,
                    block.block_num()
                )));
            }
            blocks.push(block);
        }

        // a gap in the index means the range stops there
        if includes_head && blocks.len() == on_disk as usize {
            blocks.push((*head.block).clone());
        }
        Ok(blocks)
    }

    /// Stored bytes of one block and how they are encoded.
    pub fn read_raw_block_data_by_num(
        &self,
        block_num: u32,
    ) -> Result<Option<(Vec<u8>, BlockAttributes)>, BlockLogError> {
        let files = self.files()?;
        let Some(head) = self.head_snapshot()? else {
            return Ok(None);
        };
        if block_num == 0 || block_num > head.block_num() {
            return Ok(None);
        }
        if block_num == head.block_num() {
            return files
                .block_log_file()
                .read_record(head.position, head.payload_len)
                .map(Some);
        }
        let Some(entry) = files.block_log_idx().read(block_num, head.block_num())? else {
            return Ok(None);
        };
        files
            .block_log_file()
            .read_record(entry.position, entry.payload_len())
            .map(Some)
    }

    /// Turn stored bytes back into serialized block bytes.
    pub fn decompress_raw_block(
        &self,
        bytes: &[u8],
        attributes: BlockAttributes,
    ) -> Result<Vec<u8>, BlockLogError> {
        Ok(self
            .files()?
            .compressor()
            .decode_payload(bytes, attributes, None)?)
    }

    /// Stored bytes of the head record, taken at the cached head's position.
    pub fn read_raw_head_block(&self) -> Result<Option<(Vec<u8>, BlockAttributes)>, BlockLogError> {
        let files = self.files()?;
        let Some(head) = self.head_snapshot()? else {
            return Ok(None);
        };
        files
            .block_log_file()
            .read_record(head.position, head.payload_len)
            .map(Some)
    }

    /// Decode the head from the primary file, bypassing the cache.
    ///
    /// Must not race an append.
    pub fn read_head(&self) -> Result<Option<SignedBlock>, BlockLogError> {
        Ok(self
            .files()?
            .read_head()?
            .map(|head| Arc::unwrap_or_clone(head.block)))
    }

    /// The cached head; `None` when closed or empty.
    pub fn head(&self) -> Option<Arc<SignedBlock>> {
        self.file_mgr
            .as_ref()
            .and_then(|files| files.block_log_file().head())
            .map(|head| head.block)
    }

    /// Block id and signing key of one block.
    pub fn read_data_by_num(&self, block_num: u32) -> Result<BlockIdentity, BlockLogError> {
        let files = self.files()?;
        let Some(head) = self.head_snapshot()? else {
            return Ok((None, None));
        };
        if block_num > head.block_num() {
            return Ok((None, None));
        }
        files.hash_idx().read_data_by_num(block_num)
    }

    /// Block ids and signing keys for `first..first + count`.
    ///
    /// Numbers past the head map to empty optionals.
    pub fn read_data_range_by_num(
        &self,
        first: u32,
        count: u32,
    ) -> Result<BTreeMap<u32, BlockIdentity>, BlockLogError> {
        let files = self.files()?;
        let head_num = self.head_snapshot()?.map_or(0, |head| head.block_num());
        files.hash_idx().read_data_range_by_num(first, count, head_num)
    }
}
