//! # Shared Types Crate
//!
//! Block types shared between the block log and the subsystems that produce
//! and consume blocks.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: The block and its identity are defined here.
//! - **Deterministic Encoding**: A block has exactly one byte encoding, so
//!   stored bytes can be copied between logs and compared.

pub mod block;
pub mod errors;

pub use block::*;
pub use errors::*;
