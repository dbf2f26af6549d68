//! # Value Objects
//!
//! Configuration for the block log.

use crate::domain::compression::{DictionaryRegistry, DEFAULT_COMPRESSION_LEVEL};

/// Compression applied to newly appended blocks.
///
/// Passed by value into the append path; changing it never touches blocks
/// that are already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    /// Compress new blocks with zstd (default: true).
    pub enabled: bool,
    /// Zstd level (default: 15).
    pub level: i32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl CompressionSettings {
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Configuration for the block log.
///
/// All configuration values have sensible defaults for production use.
#[derive(Debug, Clone)]
pub struct BlockLogConfig {
    /// Initial compression settings for appends.
    pub compression: CompressionSettings,

    /// Trained dictionaries available for compression and decompression.
    ///
    /// Every dictionary number referenced by a stored record must be present,
    /// otherwise reading that record fails.
    pub dictionaries: DictionaryRegistry,

    /// Take an exclusive process lock on writable opens (default: true).
    pub lock: bool,
}

impl Default for BlockLogConfig {
    fn default() -> Self {
        Self {
            compression: CompressionSettings::default(),
            dictionaries: DictionaryRegistry::new(),
            lock: true,
        }
    }
}

impl BlockLogConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable compression of new blocks.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression.enabled = enabled;
        self
    }

    /// Set the zstd compression level.
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression.level = level;
        self
    }

    /// Register a trained dictionary.
    pub fn with_dictionary(mut self, number: u8, dictionary: Vec<u8>) -> Self {
        self.dictionaries.insert(number, dictionary);
        self
    }

    /// Enable or disable the process lock.
    pub fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BlockLogConfig::default();

        assert!(config.compression.enabled);
        assert_eq!(config.compression.level, DEFAULT_COMPRESSION_LEVEL);
        assert!(config.dictionaries.is_empty());
        assert!(config.lock);
    }

    #[test]
    fn test_builders() {
        let config = BlockLogConfig::new()
            .with_compression(false)
            .with_compression_level(3)
            .with_dictionary(1, vec![1, 2, 3])
            .with_lock(false);

        assert_eq!(
            config.compression,
            CompressionSettings {
                enabled: false,
                level: 3
            }
        );
        assert!(config.dictionaries.contains(1));
        assert!(!config.lock);
    }
}
