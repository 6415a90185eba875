//! Half-open time intervals in whole seconds.

use serde::{Deserialize, Serialize};

/// A half-open interval `[start, end)` of unix seconds.
///
/// Ranges with `start >= end` are empty: they overlap nothing and contain
/// nothing. They are still representable because query parsing does not
/// reject them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Length in seconds, zero for empty ranges.
    pub fn span(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.end.saturating_sub(self.start)
        }
    }

    /// Non-empty intersection test. A range ending exactly where the other
    /// starts does not overlap it.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    /// Whether this cached range can seed an answer for `requested`: it
    /// starts at or before the request, overlaps it, and is not the exact
    /// same range.
    pub fn can_seed(&self, requested: &TimeRange) -> bool {
        self.start <= requested.start && self.overlaps(requested) && self != requested
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{})", self.start, self.end)
    }
}
