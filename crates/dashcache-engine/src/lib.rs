//! Dashcache Engine: answers range queries from the range store, splicing
//! partially cached windows with freshly fetched deltas.
//!
//! [`Reconciler`] is the entry point. It depends on two capabilities: a
//! [`dashcache_store::RangeStore`] and a [`BackendFetcher`], so tests can run
//! it against the in-memory store and a scripted backend.

pub mod fetcher;
pub mod reconcile;
pub mod splice;

pub use fetcher::{BackendFetcher, Fetched, HttpFetcher};
pub use reconcile::{CacheStatus, RangeAnswer, Reconciler};
