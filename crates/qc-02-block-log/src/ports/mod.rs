//! # Ports
//!
//! Interfaces the block log exposes to its collaborators.

pub mod inbound;

pub use inbound::BlockLogApi;
