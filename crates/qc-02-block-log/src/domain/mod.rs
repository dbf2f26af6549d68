//! # Domain Layer
//!
//! Pure domain logic for the block log. Nothing here touches the filesystem.
//!
//! ## Modules
//!
//! - `position` - Packed position word and block attributes
//! - `compression` - Dictionary-based Zstd codec
//! - `config` - Configuration value objects
//! - `errors` - Domain error types

pub mod compression;
pub mod config;
pub mod errors;
pub mod position;
