//! Shared application state.

use std::sync::Arc;

use dashcache_core::DashcacheConfig;
use dashcache_engine::{BackendFetcher, Reconciler};
use dashcache_store::RangeStore;

use crate::metrics::ProxyMetrics;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: DashcacheConfig,
    pub engine: Reconciler,
    pub store: Arc<dyn RangeStore>,
    /// Client for passthrough requests; shared with the fetcher.
    pub http: reqwest::Client,
    pub metrics: ProxyMetrics,
}

impl AppState {
    pub fn new(
        config: DashcacheConfig,
        store: Arc<dyn RangeStore>,
        fetcher: Arc<dyn BackendFetcher>,
        http: reqwest::Client,
    ) -> anyhow::Result<Self> {
        let engine = Reconciler::new(store.clone(), fetcher, config.engine.clone());
        let metrics = ProxyMetrics::new()
            .map_err(|e| anyhow::anyhow!("Failed to register metrics: {}", e))?;
        Ok(Self {
            config,
            engine,
            store,
            http,
            metrics,
        })
    }
}
