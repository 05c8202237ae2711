//! Local Tier - Per-Context Memoization
//!
//! A plain map owned by exactly one [`TieredCache`](super::TieredCache). It
//! has no locking, no eviction and no TTL: entries live until
//! [`LocalStore::clear`] or until the owning context is dropped.

use std::collections::HashMap;

use bytes::Bytes;

use super::entry::LocalEntry;

/// In-memory local tier
#[derive(Debug, Default)]
pub struct LocalStore {
    entries: HashMap<String, LocalEntry>,
}

impl LocalStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key. `None` means the key was never recorded.
    pub fn get(&self, key: &str) -> Option<&LocalEntry> {
        self.entries.get(key)
    }

    /// Record a value or a confirmed miss
    pub fn put(&mut self, key: impl Into<String>, entry: LocalEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Record a value
    pub fn put_value(&mut self, key: impl Into<String>, data: Bytes) {
        self.put(key, LocalEntry::Present(data));
    }

    /// Forget a key, returning what was recorded for it
    pub fn delete(&mut self, key: &str) -> Option<LocalEntry> {
        self.entries.remove(key)
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of recorded keys, including recorded misses
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes held by present values
    pub fn size(&self) -> u64 {
        self.entries
            .values()
            .filter_map(LocalEntry::value)
            .map(|data| data.len() as u64)
            .sum()
    }
}
