//! # Block Log API Implementation
//!
//! Implements the BlockLogApi trait on top of the inherent read path.

use std::collections::BTreeMap;
use std::sync::Arc;

use shared_types::{SignedBlock, SignedBlockHeader};

use super::BlockLog;
use crate::adapters::BlockIdentity;
use crate::domain::errors::BlockLogError;
use crate::ports::inbound::BlockLogApi;

impl BlockLogApi for BlockLog {
    fn read_block_by_num(&self, block_num: u32) -> Result<Option<SignedBlock>, BlockLogError> {
        BlockLog::read_block_by_num(self, block_num)
    }

    fn read_block_header_by_num(
        &self,
        block_num: u32,
    ) -> Result<Option<SignedBlockHeader>, BlockLogError> {
        BlockLog::read_block_header_by_num(self, block_num)
    }

    fn read_block_range_by_num(
        &self,
        first: u32,
        count: u32,
    ) -> Result<Vec<SignedBlock>, BlockLogError> {
        BlockLog::read_block_range_by_num(self, first, count)
    }

    fn head(&self) -> Option<Arc<SignedBlock>> {
        BlockLog::head(self)
    }

    fn read_data_by_num(&self, block_num: u32) -> Result<BlockIdentity, BlockLogError> {
        BlockLog::read_data_by_num(self, block_num)
    }

    fn read_data_range_by_num(
        &self,
        first: u32,
        count: u32,
    ) -> Result<BTreeMap<u32, BlockIdentity>, BlockLogError> {
        BlockLog::read_data_range_by_num(self, first, count)
    }
}
