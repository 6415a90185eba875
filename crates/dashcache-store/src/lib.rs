//! Dashcache Store: range-indexed cache of backend responses.
//!
//! Entries are keyed by `(query, step)` and carry a half-open time range and
//! the verbatim response body. The [`RangeStore`] trait is the capability the
//! engine depends on; [`SqliteRangeStore`] persists entries on disk and
//! [`MemoryRangeStore`] keeps them in process.

pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use memory::MemoryRangeStore;
pub use sqlite::SqliteRangeStore;
pub use types::*;

use std::time::Duration;

use dashcache_core::{Result, TimeRange};

/// Capability interface over an interval-indexed response table.
///
/// Duplicate and overlapping entries must be tolerated: concurrent misses
/// for the same window may both insert.
pub trait RangeStore: Send + Sync {
    /// Persist a new entry.
    fn insert(&self, query: &str, step: Duration, range: TimeRange, body: &[u8]) -> Result<()>;

    /// Entry for `(query, step)` whose range equals `requested` exactly.
    fn find_exact(
        &self,
        query: &str,
        step: Duration,
        requested: TimeRange,
    ) -> Result<Option<CacheEntry>>;

    /// Among entries for `(query, step)` that start at or before
    /// `requested.start`, overlap `requested` and are not identical to it,
    /// the one with the latest end.
    fn find_overlapping(
        &self,
        query: &str,
        step: Duration,
        requested: TimeRange,
    ) -> Result<Option<CacheEntry>>;

    /// Entry counts and sizes.
    fn stats(&self) -> Result<StoreStats>;
}
