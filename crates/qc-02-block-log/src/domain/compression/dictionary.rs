//! # Compression Dictionaries
//!
//! Trained zstd dictionaries, keyed by dictionary number.
//!
//! Dictionaries are trained per range of one million blocks. A block is
//! compressed with the newest dictionary whose range starts at or before it,
//! so old blocks keep a dictionary trained on similar data and new blocks
//! fall back to the latest one available.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Number of blocks covered by one dictionary.
pub const BLOCKS_PER_DICTIONARY: u32 = 1_000_000;

/// Registry of raw dictionary bytes.
#[derive(Debug, Clone, Default)]
pub struct DictionaryRegistry {
    dictionaries: BTreeMap<u8, Arc<Vec<u8>>>,
}

impl DictionaryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a dictionary.
    pub fn insert(&mut self, number: u8, dictionary: Vec<u8>) {
        self.dictionaries.insert(number, Arc::new(dictionary));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_dictionary(mut self, number: u8, dictionary: Vec<u8>) -> Self {
        self.insert(number, dictionary);
        self
    }

    pub fn get(&self, number: u8) -> Option<&[u8]> {
        self.dictionaries.get(&number).map(|d| d.as_slice())
    }

    pub fn contains(&self, number: u8) -> bool {
        self.dictionaries.contains_key(&number)
    }

    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dictionaries.len()
    }

    /// Dictionary to compress `block_num` with, if any.
    pub fn dictionary_for_block(&self, block_num: u32) -> Option<u8> {
        let wanted = (block_num / BLOCKS_PER_DICTIONARY).min(u8::MAX as u32) as u8;
        self.dictionaries
            .range(..=wanted)
            .next_back()
            .map(|(number, _)| *number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry_selects_nothing() {
        let registry = DictionaryRegistry::new();
        assert_eq!(registry.dictionary_for_block(1), None);
    }

    #[test]
    fn test_selects_newest_dictionary_at_or_before_range() {
        let registry = DictionaryRegistry::new()
            .with_dictionary(0, vec![0])
            .with_dictionary(2, vec![2]);

        assert_eq!(registry.dictionary_for_block(1), Some(0));
        assert_eq!(registry.dictionary_for_block(1_999_999), Some(0));
        assert_eq!(registry.dictionary_for_block(2_000_000), Some(2));
        assert_eq!(registry.dictionary_for_block(90_000_000), Some(2));
    }

    #[test]
    fn test_no_dictionary_before_first_range() {
        let registry = DictionaryRegistry::new().with_dictionary(3, vec![3]);

        assert_eq!(registry.dictionary_for_block(10), None);
        assert_eq!(registry.dictionary_for_block(3_000_001), Some(3));
    }
}
