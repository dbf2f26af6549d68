//! # Block Log Rewrite
//!
//! Copies the first N blocks of a primary file into a new one, recomputing
//! every trailing word for the output offsets. Only the primary file is
//! written; indexes for the output are rebuilt when it is next opened.
//!
//! The input is read forward from offset 0 and nothing past block N is
//! touched, so a corrupted tail is simply left behind. Record boundaries come
//! from the input's position index when it has one; otherwise (or where the
//! index disagrees with the file) each record is found by its self-referencing
//! trailing word. Each record is decoded to prove it is a block before it is
//! copied. The copy stops early at the first record that cannot be found.

use std::fs::OpenOptions;
use std::path::Path;

use shared_types::SignedBlock;

use crate::adapters::file_operation::write_with_retry;
use crate::adapters::{BlockLogFile, BlockLogIndex};
use crate::domain::compression::{BlockCompressor, DecompressionContext, DictionaryRegistry};
use crate::domain::errors::BlockLogError;
use crate::domain::position::{BlockAttributes, PositionWord, POSITION_WORD_SIZE};

use super::file_manager::{decode_block, locate_record, FileManager};

/// How often progress is logged.
const PROGRESS_INTERVAL: u32 = 1000;

/// Outcome of a rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Blocks copied to the output.
    pub blocks_written: u32,
    /// Bytes appended to the output.
    pub bytes_written: u64,
    /// Blocks whose input offset differed from the output length at copy time.
    pub position_mismatches: Vec<u32>,
    /// Records whose decoded block number was not the expected next one.
    pub sequence_mismatches: Vec<u32>,
}

/// Copy blocks `1..=max_block_num` from `input` to `output`, appending if
/// `output` already exists. Fewer are copied if the input runs out of
/// readable records first.
pub fn rewrite(
    input: &Path,
    output: &Path,
    max_block_num: u32,
    dictionaries: &DictionaryRegistry,
) -> Result<RewriteReport, BlockLogError> {
    let source = BlockLogFile::open(input, true)?;
    let compressor = BlockCompressor::new(dictionaries.clone());
    let mut report = RewriteReport::default();

    #[cfg(feature = "tracing-log")]
    tracing::info!(
        "[qc-02] 🔁 Rewriting {} into {} (up to block #{})",
        input.display(),
        output.display(),
        max_block_num
    );

    let index = match BlockLogIndex::open(&FileManager::index_path(input), true) {
        Ok(index) => Some(index),
        Err(BlockLogError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    let target = OpenOptions::new().create(true).append(true).open(output)?;
    let mut output_len = target.metadata()?.len();
    let input_len = source.size();
    let mut input_offset = 0;
    let mut context = DecompressionContext::new();

    for expected in 1..=max_block_num {
        if input_offset >= input_len {
            break;
        }

        let indexed = match &index {
            Some(index) => read_indexed(&source, &compressor, index, expected, input_offset, &mut context)?,
            None => None,
        };
        let record = match indexed {
            Some(record) => Some(record),
            None => locate_record(&source, &compressor, input_offset, input_len, None)?
                .map(|(block, position, payload_len)| {
                    let (bytes, attributes) = source.read_record(position, payload_len)?;
                    Ok::<_, BlockLogError>(InputRecord { block, bytes, attributes })
                })
                .transpose()?,
        };
        let Some(InputRecord { block, bytes, attributes }) = record else {
            #[cfg(feature = "tracing-log")]
            tracing::warn!(
                "[qc-02] ⚠️ No readable record at input offset {}, stopping before block #{}",
                input_offset,
                expected
            );
            break;
        };

        if block.block_num() != expected {
            #[cfg(feature = "tracing-log")]
            tracing::warn!(
                "[qc-02] ⚠️ Block number mismatch: expected #{}, record holds #{}",
                expected,
                block.block_num()
            );
            report.sequence_mismatches.push(expected);
        }
        if input_offset != output_len {
            #[cfg(feature = "tracing-log")]
            tracing::warn!(
                "[qc-02] ⚠️ Block position mismatch for #{}: input offset {}, output offset {}",
                expected,
                input_offset,
                output_len
            );
            report.position_mismatches.push(expected);
        }

        let trailing = PositionWord::new(output_len, attributes)?;
        let mut record = Vec::with_capacity(bytes.len() + POSITION_WORD_SIZE as usize);
        record.extend_from_slice(&bytes);
        record.extend_from_slice(&trailing.to_le_bytes());
        write_with_retry(&mut &target, &record)?;

        input_offset += record.len() as u64;
        output_len += record.len() as u64;
        report.bytes_written += record.len() as u64;
        report.blocks_written += 1;

        if report.blocks_written % PROGRESS_INTERVAL == 0 {
            #[cfg(feature = "tracing-log")]
            tracing::info!("[qc-02] Rewritten block: {}", expected);
        }
    }

    target.sync_all()?;

    #[cfg(feature = "tracing-log")]
    tracing::info!(
        "[qc-02] ✅ Rewrote {} blocks ({} bytes) into {}",
        report.blocks_written,
        report.bytes_written,
        output.display()
    );

    Ok(report)
}

struct InputRecord {
    block: SignedBlock,
    bytes: Vec<u8>,
    attributes: BlockAttributes,
}

/// Read record `block_num` at `offset` through the input's index.
///
/// `None` when the index does not cover the record or disagrees with the
/// file: the entry must point at `offset`, the successor entry must exist,
/// the trailing word in the file must equal the entry and the payload must
/// decode.
fn read_indexed(
    source: &BlockLogFile,
    compressor: &BlockCompressor,
    index: &BlockLogIndex,
    block_num: u32,
    offset: u64,
    context: &mut DecompressionContext,
) -> Result<Option<InputRecord>, BlockLogError> {
    let Some(next_num) = block_num.checked_add(1) else {
        return Ok(None);
    };
    let (Some(entry), Some(next)) = (index.read_word(block_num)?, index.read_word(next_num)?) else {
        return Ok(None);
    };
    if entry.offset() != offset
        || next.offset() < offset + POSITION_WORD_SIZE
        || next.offset() > source.size()
    {
        return Ok(None);
    }
    let payload_len = next.offset() - offset - POSITION_WORD_SIZE;
    if source.read_position_word_at(offset + payload_len).ok() != Some(entry) {
        return Ok(None);
    }

    let (bytes, attributes) = source.read_record(entry, payload_len)?;
    match decode_block(compressor, &bytes, attributes, Some(context)) {
        Ok(block) => Ok(Some(InputRecord { block, bytes, attributes })),
        Err(_) => Ok(None),
    }
}
