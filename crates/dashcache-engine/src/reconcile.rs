//! Cache lookup and partial-hit reconciliation.
//!
//! A request is answered from, in order of preference: a stored entry with
//! the exact same range, a stored entry that covers its start (chopped and
//! spliced with a freshly resolved delta), or a full backend fetch. Cache
//! failures of any kind degrade to the full fetch; only malformed requests
//! and backend failures reach the caller.
//!
//! Splicing walks forward through cached segments instead of recursing: each
//! partial hit pushes its chopped response and moves the window to start at
//! the segment's end. The walk stops on a miss, an exact hit, an empty
//! remainder or the configured depth, after which segments are merged back
//! to front.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, warn};

use dashcache_core::{EngineConfig, Error, PromResponse, QueryDescriptor, Result, TimeRange};
use dashcache_store::{CacheEntry, RangeStore};

use crate::fetcher::BackendFetcher;
use crate::splice::{chop, merge, trim_after};

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    /// Stored body returned verbatim.
    Hit,
    /// Cached data spliced with a fetched delta.
    Partial,
    /// Fetched from the backend.
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Partial => "partial",
            Self::Miss => "miss",
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response body for a range query plus its classification.
#[derive(Debug, Clone)]
pub struct RangeAnswer {
    pub status: CacheStatus,
    /// JSON body to send to the client.
    pub body: Bytes,
    pub elapsed: Duration,
}

impl RangeAnswer {
    /// Decode the body.
    pub fn response(&self) -> Result<PromResponse> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// What a window resolved to before splicing.
enum Resolved {
    /// Exact stored entry, still serialized.
    Stored(Bytes),
    /// Full backend fetch; `raw` is the body as received.
    Fetched { response: PromResponse, raw: Bytes },
    Spliced(PromResponse),
}

impl Resolved {
    fn status(&self) -> CacheStatus {
        match self {
            Self::Stored(_) => CacheStatus::Hit,
            Self::Fetched { .. } => CacheStatus::Miss,
            Self::Spliced(_) => CacheStatus::Partial,
        }
    }

    fn into_response(self) -> Result<PromResponse> {
        match self {
            Self::Stored(body) => serde_json::from_slice(&body)
                .map_err(|e| Error::Merge(format!("stored body does not decode: {}", e))),
            Self::Fetched { response, .. } => Ok(response),
            Self::Spliced(response) => Ok(response),
        }
    }

    fn into_body(self) -> Result<Bytes> {
        match self {
            Self::Stored(body) => Ok(body),
            Self::Fetched { raw, .. } => Ok(raw),
            Self::Spliced(response) => Ok(Bytes::from(serde_json::to_vec(&response)?)),
        }
    }
}

/// Result of consulting the store for one window.
enum Lookup {
    Miss,
    Exact(CacheEntry),
    Partial(CacheEntry),
}

/// A cached segment chopped to its window, waiting for the rest.
struct Segment {
    window: QueryDescriptor,
    head: PromResponse,
}

/// Answers range queries from the range store and the backend.
pub struct Reconciler {
    store: Arc<dyn RangeStore>,
    fetcher: Arc<dyn BackendFetcher>,
    config: EngineConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RangeStore>,
        fetcher: Arc<dyn BackendFetcher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse a request URI and answer it.
    pub async fn query_range(&self, uri: &str) -> Result<RangeAnswer> {
        let query = QueryDescriptor::parse(uri)?;
        self.resolve(&query).await
    }

    /// Answer a parsed range query.
    pub async fn resolve(&self, query: &QueryDescriptor) -> Result<RangeAnswer> {
        let started = Instant::now();
        debug!("resolving key={}", query.key());

        let mut segments: Vec<Segment> = Vec::new();
        let mut window = query.clone();

        let mut tail = loop {
            if segments.len() >= self.config.max_splice_depth {
                warn!(
                    "splice depth {} reached at {}, fetching the remainder",
                    segments.len(),
                    window.range()
                );
                break Some(self.fetch_full(&window).await?);
            }

            let entry = match self.lookup(&window) {
                Lookup::Miss => break Some(self.fetch_full(&window).await?),
                Lookup::Exact(entry) => {
                    debug!("exact hit for {}", window.range());
                    break Some(Resolved::Stored(entry.body));
                }
                Lookup::Partial(entry) => entry,
            };

            debug!("partial hit {} for {}", entry.range, window.range());
            let mut head: PromResponse = match serde_json::from_slice(&entry.body) {
                Ok(head) => head,
                Err(e) => {
                    warn!("stored body for {} does not decode, ignoring: {}", entry.range, e);
                    break Some(self.fetch_full(&window).await?);
                }
            };
            chop(&mut head, window.start);

            let remainder = window.with_range(TimeRange::new(entry.range.end, window.end));
            segments.push(Segment { window, head });
            if remainder.range().is_empty() {
                break None;
            }
            window = remainder;
        };

        while let Some(Segment { window, mut head }) = segments.pop() {
            let merged = match tail {
                None => {
                    trim_after(&mut head, window.end);
                    Ok(head)
                }
                Some(delta) => delta.into_response().and_then(|delta| merge(head, delta)),
            };
            tail = Some(match merged {
                Ok(response) => Resolved::Spliced(response),
                Err(e) => {
                    warn!("couldn't merge data for {}: {}", window.range(), e);
                    self.fetch_full(&window).await?
                }
            });
        }

        let resolved = tail.ok_or_else(|| Error::Internal("no response resolved".to_string()))?;
        let status = resolved.status();
        let body = resolved.into_body()?;
        let elapsed = started.elapsed();
        info!(
            "query_range {} range={} cache={} took={:?}",
            query.query,
            query.range(),
            status,
            elapsed
        );
        Ok(RangeAnswer {
            status,
            body,
            elapsed,
        })
    }

    /// Consult the store. Store errors are logged and read as a miss.
    fn lookup(&self, window: &QueryDescriptor) -> Lookup {
        if !self.config.cache_enabled {
            return Lookup::Miss;
        }
        let range = window.range();

        match self.store.find_exact(&window.query, window.step, range) {
            Ok(Some(entry)) => return Lookup::Exact(entry),
            Ok(None) => {}
            Err(e) => {
                warn!("error checking cache, ignoring: {}", e);
                return Lookup::Miss;
            }
        }

        match self.store.find_overlapping(&window.query, window.step, range) {
            Ok(Some(entry)) if entry.range == range => Lookup::Exact(entry),
            Ok(Some(entry)) => Lookup::Partial(entry),
            Ok(None) => {
                debug!("cache miss for {}", range);
                Lookup::Miss
            }
            Err(e) => {
                warn!("error checking cache, ignoring: {}", e);
                Lookup::Miss
            }
        }
    }

    /// Fetch the whole window from the backend and store it if eligible.
    async fn fetch_full(&self, window: &QueryDescriptor) -> Result<Resolved> {
        let fetched = self.fetcher.fetch(window, true).await?;
        let raw = match fetched.raw {
            Some(raw) => raw,
            None => Bytes::from(serde_json::to_vec(&fetched.response)?),
        };

        if self.config.cache_enabled && self.is_cacheable(window, &fetched.response) {
            if let Err(e) = self
                .store
                .insert(&window.query, window.step, window.range(), &raw)
            {
                warn!("error inserting data: {}", e);
            }
        }

        Ok(Resolved::Fetched {
            response: fetched.response,
            raw,
        })
    }

    /// Only successful matrix responses spanning at least the configured
    /// minimum are stored.
    pub fn is_cacheable(&self, window: &QueryDescriptor, response: &PromResponse) -> bool {
        response.is_success()
            && response.is_matrix()
            && i128::from(window.end) - i128::from(window.start)
                >= i128::from(self.config.min_cacheable_span_secs)
    }
}
