//! # Inbound Ports (Driving Ports)
//!
//! The read API consumed by the API layer.
//!
//! These are the operations other subsystems use to serve blocks. They return
//! the block log's own types; projecting them into response shapes is the
//! caller's job.

use std::collections::BTreeMap;
use std::sync::Arc;

use shared_types::{SignedBlock, SignedBlockHeader};

use crate::adapters::BlockIdentity;
use crate::domain::errors::BlockLogError;

/// Read API of the block log.
///
/// All methods are safe to call from any number of threads while one other
/// thread appends.
pub trait BlockLogApi: Send + Sync {
    /// Read a block by number.
    ///
    /// ## Returns
    ///
    /// `None` for block 0, for an empty log, and for numbers past the head.
    fn read_block_by_num(&self, block_num: u32) -> Result<Option<SignedBlock>, BlockLogError>;

    /// Read only the signed header of a block.
    fn read_block_header_by_num(
        &self,
        block_num: u32,
    ) -> Result<Option<SignedBlockHeader>, BlockLogError>;

    /// Read up to `count` consecutive blocks starting at `first`.
    ///
    /// ## Returns
    ///
    /// Blocks in ascending order; fewer than `count` if the range runs past
    /// the head.
    fn read_block_range_by_num(
        &self,
        first: u32,
        count: u32,
    ) -> Result<Vec<SignedBlock>, BlockLogError>;

    /// The most recently appended block.
    fn head(&self) -> Option<Arc<SignedBlock>>;

    /// Block id and signing key of a block.
    fn read_data_by_num(&self, block_num: u32) -> Result<BlockIdentity, BlockLogError>;

    /// Block ids and signing keys for a range, keyed by block number.
    fn read_data_range_by_num(
        &self,
        first: u32,
        count: u32,
    ) -> Result<BTreeMap<u32, BlockIdentity>, BlockLogError>;
}
