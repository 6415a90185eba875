//! Data types for cached range entries.

use std::time::Duration;

use bytes::Bytes;
use dashcache_core::TimeRange;

/// A stored response. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub query: String,
    pub step: Duration,
    pub range: TimeRange,
    /// Response body exactly as the backend sent it.
    pub body: Bytes,
}

/// Store-level statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total_entries: i64,
    pub distinct_queries: i64,
    pub body_bytes: i64,
    pub location: String,
}
