//! In-process range store.
//!
//! Entries are grouped by `(query, step)` and kept sorted by range end so the
//! latest-ending candidate is found by a reverse scan.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::types::{CacheEntry, StoreStats};
use crate::RangeStore;
use dashcache_core::{Result, TimeRange};

type SeriesKey = (String, Duration);

/// Thread-safe in-memory interval index.
#[derive(Default)]
pub struct MemoryRangeStore {
    entries: RwLock<HashMap<SeriesKey, Vec<CacheEntry>>>,
}

impl MemoryRangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries for `(query, step)`, ordered by range end.
    pub fn entries_for(&self, query: &str, step: Duration) -> Vec<CacheEntry> {
        self.entries
            .read()
            .get(&(query.to_string(), step))
            .cloned()
            .unwrap_or_default()
    }
}

impl RangeStore for MemoryRangeStore {
    fn insert(&self, query: &str, step: Duration, range: TimeRange, body: &[u8]) -> Result<()> {
        let mut entries = self.entries.write();
        let bucket = entries.entry((query.to_string(), step)).or_default();
        // After any existing entry with the same end, so newer rows win ties.
        let pos = bucket.partition_point(|e| e.range.end <= range.end);
        bucket.insert(
            pos,
            CacheEntry {
                query: query.to_string(),
                step,
                range,
                body: Bytes::copy_from_slice(body),
            },
        );
        Ok(())
    }

    fn find_exact(
        &self,
        query: &str,
        step: Duration,
        requested: TimeRange,
    ) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read();
        Ok(entries
            .get(&(query.to_string(), step))
            .and_then(|bucket| bucket.iter().rev().find(|e| e.range == requested))
            .cloned())
    }

    fn find_overlapping(
        &self,
        query: &str,
        step: Duration,
        requested: TimeRange,
    ) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read();
        Ok(entries
            .get(&(query.to_string(), step))
            .and_then(|bucket| bucket.iter().rev().find(|e| e.range.can_seed(&requested)))
            .cloned())
    }

    fn stats(&self) -> Result<StoreStats> {
        let entries = self.entries.read();
        Ok(StoreStats {
            total_entries: entries.values().map(|b| b.len() as i64).sum(),
            distinct_queries: entries.values().filter(|b| !b.is_empty()).count() as i64,
            body_bytes: entries
                .values()
                .flatten()
                .map(|e| e.body.len() as i64)
                .sum(),
            location: "memory".to_string(),
        })
    }
}
