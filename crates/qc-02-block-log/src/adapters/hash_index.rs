//! # Hash Index
//!
//! Block number → (block id, signing key), so identity lookups never need to
//! decode a full block. Fixed-width entries at `52 * (block_num - 1)`:
//!
//! ```text
//! +----------------+-----------------+
//! | block id (20B) | signing key (32B) |
//! +----------------+-----------------+
//! ```

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use shared_types::{BlockId, PublicKey};

use super::file_operation::{read_exact_at, write_all_at};
use crate::domain::errors::BlockLogError;

/// Width of one hash index entry.
pub const HASH_ENTRY_SIZE: u64 = (BlockId::LEN + 32) as u64;

/// Identity data for one block; both halves are absent when not indexed.
pub type BlockIdentity = (Option<BlockId>, Option<PublicKey>);

fn entry_offset(block_num: u32) -> u64 {
    (block_num as u64 - 1) * HASH_ENTRY_SIZE
}

fn encode_entry(id: &BlockId, key: &PublicKey) -> [u8; HASH_ENTRY_SIZE as usize] {
    let mut entry = [0u8; HASH_ENTRY_SIZE as usize];
    entry[..BlockId::LEN].copy_from_slice(id.as_bytes());
    entry[BlockId::LEN..].copy_from_slice(key);
    entry
}

fn decode_entry(bytes: &[u8]) -> (BlockId, PublicKey) {
    let mut id = [0u8; BlockId::LEN];
    let mut key = [0u8; 32];
    id.copy_from_slice(&bytes[..BlockId::LEN]);
    key.copy_from_slice(&bytes[BlockId::LEN..HASH_ENTRY_SIZE as usize]);
    (BlockId(id), key)
}

/// Hash index file.
pub struct HashIndex {
    path: PathBuf,
    file: File,
    read_only: bool,
    size: AtomicU64,
}

impl HashIndex {
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

    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Number of complete entries.
    pub fn len(&self) -> u32 {
        (self.size() / HASH_ENTRY_SIZE) as u32
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

    /// Write the entry for `block_num`, which must be the next one.
    pub fn append(&self, block_num: u32, id: &BlockId, key: &PublicKey) -> Result<(), BlockLogError> {
        self.ensure_writable()?;
        let expected = self.len() + 1;
        if block_num != expected {
            return Err(BlockLogError::NonSequentialBlock {
                expected,
                actual: block_num,
            });
        }
        write_all_at(&self.file, &encode_entry(id, key), entry_offset(block_num))?;
        self.size
            .store(block_num as u64 * HASH_ENTRY_SIZE, Ordering::Release);
        Ok(())
    }

    /// Identity of `block_num`; empty optionals if not indexed.
    pub fn read_data_by_num(&self, block_num: u32) -> Result<BlockIdentity, BlockLogError> {
        if block_num == 0 {
            return Ok((None, None));
        }
        match read_exact_at(&self.file, entry_offset(block_num), HASH_ENTRY_SIZE as usize) {
            Ok(bytes) => {
                let (id, key) = decode_entry(&bytes);
                Ok((Some(id), Some(key)))
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok((None, None)),
            Err(e) => Err(e.into()),
        }
    }

    /// Identities for `first..first + count`, keyed by block number.
    ///
    /// Every requested number gets a key; numbers past `head_num` or not yet
    /// indexed map to empty optionals.
    pub fn read_data_range_by_num(
        &self,
        first: u32,
        count: u32,
        head_num: u32,
    ) -> Result<BTreeMap<u32, BlockIdentity>, BlockLogError> {
        let mut result = BTreeMap::new();
        if first == 0 || count == 0 {
            return Ok(result);
        }

        let last = first.saturating_add(count - 1);
        let mut indexed_last = last.min(head_num);
        if indexed_last >= first {
            let start = entry_offset(first);
            let wanted = |last: u32| ((last - first + 1) as u64 * HASH_ENTRY_SIZE) as usize;
            let bytes = match read_exact_at(&self.file, start, wanted(indexed_last)) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    let on_disk = self.file.metadata()?.len().saturating_sub(start) / HASH_ENTRY_SIZE;
                    indexed_last = indexed_last.min(first - 1 + on_disk as u32);
                    if indexed_last < first {
                        Vec::new()
                    } else {
                        read_exact_at(&self.file, start, wanted(indexed_last))?
                    }
                }
                Err(e) => return Err(e.into()),
            };
            for (i, chunk) in bytes.chunks_exact(HASH_ENTRY_SIZE as usize).enumerate() {
                let (id, key) = decode_entry(chunk);
                result.insert(first + i as u32, (Some(id), Some(key)));
            }
        }
        for block_num in first..=last {
            result.entry(block_num).or_insert((None, None));
        }
        Ok(result)
    }

    /// Drop entries past `entries`.
    pub fn truncate(&self, entries: u32) -> Result<(), BlockLogError> {
        self.ensure_writable()?;
        let len = entries as u64 * HASH_ENTRY_SIZE;
        self.file.set_len(len)?;
        self.size.store(len, Ordering::Release);
        Ok(())
    }

    /// Rebuild entries up to `head_num` from decoded blocks.
    ///
    /// With `resume`, the last complete persisted entry is checked against the
    /// real block id first; a mismatch forces a full rebuild.
    pub fn construct_index<F>(
        &self,
        head_num: u32,
        resume: bool,
        mut identity_of: F,
    ) -> Result<u32, BlockLogError>
    where
        F: FnMut(u32) -> Result<(BlockId, PublicKey), BlockLogError>,
    {
        self.ensure_writable()?;

        let mut persisted = if resume { self.len().min(head_num) } else { 0 };
        if persisted > 0 {
            let (stored_id, _) = self.read_data_by_num(persisted)?;
            let (real_id, _) = identity_of(persisted)?;
            if stored_id != Some(real_id) {
                #[cfg(feature = "tracing-log")]
                tracing::warn!(
                    "[qc-02] ⚠️ Hash index entry #{} does not match the block log, rebuilding {}",
                    persisted,
                    self.path.display()
                );
                persisted = 0;
            }
        }

        #[cfg(feature = "tracing-log")]
        tracing::info!(
            "[qc-02] 🔧 Reconstructing {} from block #{} to #{}",
            self.path.display(),
            persisted + 1,
            head_num
        );

        self.truncate(persisted)?;
        for block_num in persisted + 1..=head_num {
            let (id, key) = identity_of(block_num)?;
            self.append(block_num, &id, &key)?;
        }
        self.file.sync_all()?;

        Ok(head_num - persisted)
    }
}
