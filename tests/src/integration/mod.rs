//! # Integration Tests
//!
//! Cross-component flows against real files in temporary directories.

pub mod block_log_flows;
