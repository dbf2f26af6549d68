//! # Block Log Service
//!
//! The façade over the primary file and its indexes.
//!
//! ## Architecture
//!
//! This service:
//! 1. Opens, reconciles and closes the file triple through [`FileManager`]
//! 2. Appends blocks in the order data, position index, hash index, head
//! 3. Serves reads from the indexes, splicing in the cached head
//! 4. Implements `BlockLogApi` for the API layer
//!
//! ## Concurrency
//!
//! One writer, many readers. `append` takes `&self` so a single `Arc<BlockLog>`
//! can be shared, but callers must not append from two threads at once.
//! Readers never observe a half-appended block: the head is published last,
//! and every read is bounded by the head it snapshots first.

mod file_manager;
mod reads;
mod rewrite;
mod storage;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use shared_types::SignedBlock;

use crate::adapters::HeadBlock;
use crate::domain::config::{BlockLogConfig, CompressionSettings};
use crate::domain::errors::BlockLogError;
use crate::domain::position::BlockAttributes;

pub use file_manager::FileManager;
pub use rewrite::{rewrite, RewriteReport};

/// The block log.
pub struct BlockLog {
    config: BlockLogConfig,
    /// `None` while closed.
    file_mgr: Option<FileManager>,
    compression_enabled: AtomicBool,
    compression_level: AtomicI32,
}

impl BlockLog {
    /// Create a closed block log.
    pub fn new(config: BlockLogConfig) -> Self {
        Self {
            compression_enabled: AtomicBool::new(config.compression.enabled),
            compression_level: AtomicI32::new(config.compression.level),
            config,
            file_mgr: None,
        }
    }

    /// Create and open in one step.
    pub fn open_at(
        path: impl AsRef<Path>,
        read_only: bool,
        config: BlockLogConfig,
    ) -> Result<Self, BlockLogError> {
        let mut log = Self::new(config);
        log.open(path, read_only)?;
        Ok(log)
    }

    /// Open the log at `path`, closing any log already open.
    ///
    /// Writable opens create missing files, repair a torn tail and rebuild
    /// stale indexes. Read-only opens require the files to exist and change
    /// nothing on disk.
    pub fn open(&mut self, path: impl AsRef<Path>, read_only: bool) -> Result<(), BlockLogError> {
        let path = path.as_ref();
        self.close();

        #[cfg(feature = "tracing-log")]
        tracing::info!(
            "[qc-02] 📂 Opening block log {}{}",
            path.display(),
            if read_only { " (read-only)" } else { "" }
        );

        let file_mgr = FileManager::open(path, read_only, &self.config)?;
        file_mgr.prepare()?;

        #[cfg(feature = "tracing-log")]
        match file_mgr.block_log_file().head() {
            Some(head) => tracing::info!("[qc-02] ✅ Block log open, head is #{}", head.block_num()),
            None => tracing::info!("[qc-02] ✅ Block log open, log is empty"),
        }

        self.file_mgr = Some(file_mgr);
        Ok(())
    }

    /// Release the files and the process lock; a no-op when closed.
    pub fn close(&mut self) {
        if let Some(file_mgr) = self.file_mgr.take() {
            file_mgr.block_log_file().flush();
            #[cfg(feature = "tracing-log")]
            tracing::info!(
                "[qc-02] 📁 Closed block log {}",
                file_mgr.block_log_file().path().display()
            );
        }
    }

    pub fn is_open(&self) -> bool {
        self.file_mgr.is_some()
    }

    /// Path of the primary file, if open.
    pub fn path(&self) -> Option<PathBuf> {
        self.file_mgr
            .as_ref()
            .map(|f| f.block_log_file().path().to_path_buf())
    }

    pub fn config(&self) -> &BlockLogConfig {
        &self.config
    }

    pub(crate) fn files(&self) -> Result<&FileManager, BlockLogError> {
        self.file_mgr.as_ref().ok_or(BlockLogError::NotOpen)
    }

    // =========================================================================
    // COMPRESSION SETTINGS
    // =========================================================================

    /// Enable or disable compression of blocks appended from now on.
    pub fn set_compression(&self, enabled: bool) {
        self.compression_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Zstd level for blocks appended from now on.
    pub fn set_compression_level(&self, level: i32) {
        self.compression_level.store(level, Ordering::Relaxed);
    }

    /// Settings the next append will use.
    pub fn compression_settings(&self) -> CompressionSettings {
        CompressionSettings {
            enabled: self.compression_enabled.load(Ordering::Relaxed),
            level: self.compression_level.load(Ordering::Relaxed),
        }
    }

    // =========================================================================
    // WRITE PATH
    // =========================================================================

    /// Append the next block, compressing it per the current settings.
    ///
    /// Returns the offset the record starts at.
    pub fn append(&self, block: &SignedBlock) -> Result<u64, BlockLogError> {
        self.append_with(block, self.compression_settings())
    }

    /// Append with explicit compression settings.
    pub fn append_with(
        &self,
        block: &SignedBlock,
        compression: CompressionSettings,
    ) -> Result<u64, BlockLogError> {
        let files = self.files()?;
        self.check_sequence(files, block.block_num())?;

        let serialized = block.to_bytes()?;
        let (payload, attributes) = if compression.enabled {
            let dictionary = files
                .compressor()
                .dictionaries()
                .dictionary_for_block(block.block_num());
            let compressed = files.compressor().compress(
                &serialized,
                dictionary,
                Some(compression.level),
                None,
            )?;
            (compressed, BlockAttributes::zstd(dictionary))
        } else {
            (serialized, BlockAttributes::uncompressed())
        };

        self.append_record(files, block.clone(), &payload, attributes)
    }

    /// Append bytes that are already in stored form.
    ///
    /// The bytes are decoded once to validate them and to learn the block's
    /// number and identity; they are written unchanged.
    pub fn append_raw(
        &self,
        bytes: &[u8],
        attributes: BlockAttributes,
    ) -> Result<u64, BlockLogError> {
        let files = self.files()?;
        let block = file_manager::decode_block(files.compressor(), bytes, attributes, None)?;
        self.check_sequence(files, block.block_num())?;
        self.append_record(files, block, bytes, attributes)
    }

    /// Appends are unbuffered; kept for callers that flush at checkpoints.
    pub fn flush(&self) -> Result<(), BlockLogError> {
        self.files()?.block_log_file().flush();
        Ok(())
    }

    fn check_sequence(&self, files: &FileManager, block_num: u32) -> Result<(), BlockLogError> {
        let expected = files
            .block_log_file()
            .head()
            .map_or(1, |head| head.block_num() + 1);
        if block_num != expected {
            return Err(BlockLogError::NonSequentialBlock {
                expected,
                actual: block_num,
            });
        }
        Ok(())
    }

    fn append_record(
        &self,
        files: &FileManager,
        block: SignedBlock,
        payload: &[u8],
        attributes: BlockAttributes,
    ) -> Result<u64, BlockLogError> {
        let block_num = block.block_num();

        let position = files.block_log_file().append_record(payload, attributes)?;
        files.block_log_idx().append(position)?;
        files
            .hash_idx()
            .append(block_num, &block.id(), &block.signee())?;

        files.block_log_file().set_head(Some(HeadBlock {
            block: Arc::new(block),
            position,
            payload_len: payload.len() as u64,
        }));

        #[cfg(feature = "tracing-log")]
        tracing::debug!(
            "[qc-02] 📦 Appended block #{} at offset {} ({} bytes{})",
            block_num,
            position.offset(),
            payload.len(),
            if attributes.is_compressed() { ", zstd" } else { "" }
        );

        Ok(position.offset())
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Copy the first `max_block_num` blocks of `input` to `output`.
    ///
    /// Uses this log's dictionaries to validate compressed records.
    pub fn rewrite(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        max_block_num: u32,
    ) -> Result<RewriteReport, BlockLogError> {
        rewrite(
            input.as_ref(),
            output.as_ref(),
            max_block_num,
            &self.config.dictionaries,
        )
    }
}

impl Drop for BlockLog {
    fn drop(&mut self) {
        self.close();
    }
}
