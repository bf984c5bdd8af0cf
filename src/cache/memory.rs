//! Memory Cache Module
//!
//! Process-local table of cached results, partitioned by operation so that
//! dropping one operation's entries does not scan the others.

use std::collections::HashMap;

use crate::cache::{CacheEntry, CacheKey, OperationId, Timestamp};

// == Memory Cache ==
/// In-memory layer of the memoizer.
///
/// Passive storage: it never looks at the clock on its own and never touches
/// the durable store. Callers decide freshness.
#[derive(Debug, Default)]
pub struct MemoryCache {
    /// operation -> encoded args -> entry
    partitions: HashMap<OperationId, HashMap<Vec<u8>, CacheEntry>>,
    /// Total entry count across partitions
    len: usize,
}

impl MemoryCache {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    /// Returns the entry stored under `key`, fresh or not.
    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.partitions
            .get(key.operation())
            .and_then(|partition| partition.get(key.args()))
    }

    // == Put ==
    /// Stores an entry, replacing any previous one for the same key.
    pub fn put(&mut self, key: &CacheKey, entry: CacheEntry) {
        let partition = self.partitions.entry(key.operation().clone()).or_default();
        if partition.insert(key.args().to_vec(), entry).is_none() {
            self.len += 1;
        }
    }

    // == Delete By Operation ==
    /// Drops every entry of one operation. Returns how many were removed.
    pub fn delete_by_operation(&mut self, operation: &OperationId) -> usize {
        let removed = self
            .partitions
            .remove(operation)
            .map(|partition| partition.len())
            .unwrap_or(0);
        self.len -= removed;
        removed
    }

    // == Clear ==
    /// Drops everything. Returns how many entries were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.len;
        self.partitions.clear();
        self.len = 0;
        removed
    }

    // == Purge Expired ==
    /// Removes entries that are no longer fresh at `now`.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&mut self, now: Timestamp) -> usize {
        let mut removed = 0;
        for partition in self.partitions.values_mut() {
            let before = partition.len();
            partition.retain(|_, entry| entry.is_fresh(now));
            removed += before - partition.len();
        }
        self.partitions.retain(|_, partition| !partition.is_empty());
        self.len -= removed;
        removed
    }

    /// Iterates over all entries as (operation, encoded args, entry).
    pub fn iter(&self) -> impl Iterator<Item = (&OperationId, &[u8], &CacheEntry)> {
        self.partitions.iter().flat_map(|(operation, partition)| {
            partition
                .iter()
                .map(move |(args, entry)| (operation, args.as_slice(), entry))
        })
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.len
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
