//! Chop and merge helpers for splicing a cached response with a delta.

use dashcache_core::{Error, PromResponse, Result};

/// Drop every leading sample earlier than `start` from each series.
///
/// Series whose samples all precede `start` end up empty but stay in the
/// result set.
pub fn chop(response: &mut PromResponse, start: i64) {
    let Some(series) = response.series_mut() else {
        return;
    };
    for s in series.iter_mut() {
        if let Some(values) = s.values.as_mut() {
            let first = values
                .iter()
                .position(|v| v.second() >= start)
                .unwrap_or(values.len());
            values.drain(..first);
        }
    }
}

/// Drop every sample at or after `end` from each series.
pub fn trim_after(response: &mut PromResponse, end: i64) {
    let Some(series) = response.series_mut() else {
        return;
    };
    for s in series.iter_mut() {
        if let Some(values) = s.values.as_mut() {
            values.retain(|v| v.second() < end);
        }
    }
}

/// Append the delta's samples to the matching cached series.
///
/// The output holds exactly the cached series: delta series with no label
/// match are dropped. Samples are concatenated cached-then-delta without
/// re-sorting. Unmodelled fields come from the cached side; warnings from
/// both sides are kept.
pub fn merge(mut cached: PromResponse, mut delta: PromResponse) -> Result<PromResponse> {
    if cached.status != delta.status {
        return Err(Error::Merge(format!(
            "status mismatch: cached={} delta={}",
            cached.status, delta.status
        )));
    }
    if cached.result_type() != delta.result_type() {
        return Err(Error::Merge(format!(
            "result type mismatch: cached={:?} delta={:?}",
            cached.result_type(),
            delta.result_type()
        )));
    }

    let delta_warnings = delta.warnings.take();
    let delta_series = delta
        .into_series()
        .ok_or_else(|| Error::Merge("delta result is not a series list".to_string()))?;
    let cached_series = cached
        .series_mut()
        .ok_or_else(|| Error::Merge("cached result is not a series list".to_string()))?;

    for tail in delta_series {
        let Some(head) = cached_series.iter_mut().find(|s| s.metric == tail.metric) else {
            continue;
        };
        if let Some(extra) = tail.values {
            head.values.get_or_insert_with(Vec::new).extend(extra);
        }
    }

    if let Some(extra) = delta_warnings {
        let warnings = cached.warnings.get_or_insert_with(Vec::new);
        for w in extra {
            if !warnings.contains(&w) {
                warnings.push(w);
            }
        }
    }

    Ok(cached)
}
