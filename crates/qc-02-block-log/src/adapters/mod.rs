//! # Adapters Module
//!
//! Filesystem-backed pieces of the block log.
//!
//! ## Modules
//!
//! - `file_operation`: Retrying writer and positional reads
//! - `block_log_file`: Primary log file and the cached head
//! - `index_file`: Position index (block number -> position word)
//! - `hash_index`: Hash index (block number -> id, signing key)
//! - `lock`: Process locking (singleton writer guard)

pub mod block_log_file;
pub mod file_operation;
pub mod hash_index;
pub mod index_file;
#[cfg(feature = "locking")]
pub mod lock;

pub use block_log_file::{BlockLogFile, HeadBlock};
pub use hash_index::{BlockIdentity, HashIndex, HASH_ENTRY_SIZE};
pub use index_file::{BlockLogIndex, IndexEntry};
#[cfg(feature = "locking")]
pub use lock::{BlockLogLock, LockError};
