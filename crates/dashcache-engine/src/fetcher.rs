//! Backend fetcher: runs a range query against the real backend.

use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use dashcache_core::{Error, PromResponse, QueryDescriptor, Result};

/// A decoded backend response, optionally with the exact bytes received.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub response: PromResponse,
    pub raw: Option<Bytes>,
}

/// Executes range queries against the upstream backend.
#[async_trait::async_trait]
pub trait BackendFetcher: Send + Sync {
    /// Fetch and decode `query`. When `capture_raw` is set the undecoded
    /// body is returned alongside the response.
    async fn fetch(&self, query: &QueryDescriptor, capture_raw: bool) -> Result<Fetched>;
}

/// [`BackendFetcher`] over HTTP.
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query parameters for the backend. Start and end go out as whole
    /// seconds and the step as (possibly fractional) seconds, which the
    /// backend reads without a unit.
    pub fn query_params(query: &QueryDescriptor) -> [(&'static str, String); 4] {
        [
            ("query", query.query.clone()),
            ("start", query.start.to_string()),
            ("end", query.end.to_string()),
            ("step", query.step.as_secs_f64().to_string()),
        ]
    }
}

#[async_trait::async_trait]
impl BackendFetcher for HttpFetcher {
    async fn fetch(&self, query: &QueryDescriptor, capture_raw: bool) -> Result<Fetched> {
        let url = format!("{}/api/v1/query_range", self.base_url);
        debug!("Fetching {} range={} step={:?}", url, query.range(), query.step);

        let response = self
            .client
            .get(&url)
            .query(&Self::query_params(query))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!("backend returned {}", status)));
        }

        let raw = response
            .bytes()
            .await
            .map_err(|e| Error::Upstream(format!("reading body failed: {}", e)))?;
        let decoded: PromResponse = serde_json::from_slice(&raw)
            .map_err(|e| Error::Upstream(format!("undecodable body: {}", e)))?;

        Ok(Fetched {
            response: decoded,
            raw: capture_raw.then_some(raw),
        })
    }
}
