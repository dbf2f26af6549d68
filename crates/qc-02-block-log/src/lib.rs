//! # Block Log (qc-02)
//!
//! Append-only storage for irreversible blocks. Blocks are written once, in
//! order, and read back by number from any number of threads.
//!
//! ## On-disk Layout
//!
//! ```text
//! <path>             [block 1][pos 1][block 2][pos 2] ... [head][pos head]
//! <path>.index       [pos 1][pos 2] ... [pos head]            8 bytes each
//! <path>.hash_index  [id 1|key 1][id 2|key 2] ...            52 bytes each
//! <path>.lock        PID of the writing process
//! ```
//!
//! Every record is followed by its own position word: the record's offset in
//! the low 48 bits and its compression attributes in the high byte. The
//! primary file alone is enough to rebuild both indexes.
//!
//! ## Guarantees
//!
//! | Guarantee | Description |
//! |-----------|-------------|
//! | Sequential | Block `n + 1` is only accepted after block `n` |
//! | Recoverable | Stale or missing indexes are rebuilt on open |
//! | Crash-safe tail | A torn final record is cut off on writable open |
//! | Consistent reads | Readers never see a block before its indexes |
//! | Single writer | A process lock keeps a second writer out |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Position words, compression, configuration, errors
//! - `adapters/` - The three files and the process lock
//! - `ports/` - The read API consumed by other subsystems
//! - `service/` - The `BlockLog` façade, reconciliation and rewrite
//!
//! ## Usage
//!
//! ```ignore
//! use qc_02_block_log::{BlockLog, BlockLogConfig};
//!
//! let log = BlockLog::open_at("data/block_log", false, BlockLogConfig::default())?;
//! log.append(&block)?;
//!
//! let head = log.head();
//! let blocks = log.read_block_range_by_num(1, 100)?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod test_utils;

// Re-export key types for convenience
pub use adapters::{BlockIdentity, HeadBlock};
pub use domain::compression::{DictionaryRegistry, DEFAULT_COMPRESSION_LEVEL};
pub use domain::config::{BlockLogConfig, CompressionSettings};
pub use domain::errors::{BlockLogError, CompressionError};
pub use domain::position::{BlockAttributes, BlockFlags, PositionWord};
pub use ports::inbound::BlockLogApi;
pub use service::{rewrite, BlockLog, FileManager, RewriteReport};
