//! Prometheus instrumentation for the proxy itself.

use std::time::Duration;

use prometheus::{Encoder, HistogramOpts, HistogramVec, Registry, TextEncoder};

/// Request duration histogram labelled by cache outcome.
pub struct ProxyMetrics {
    registry: Registry,
    duration: HistogramVec,
}

impl ProxyMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "dashcache_duration_seconds",
                "Range query duration in seconds by cache outcome",
            ),
            &["cache"],
        )?;
        let registry = Registry::new();
        registry.register(Box::new(duration.clone()))?;
        Ok(Self { registry, duration })
    }

    /// Record one request. `outcome` is hit, partial, miss or error.
    pub fn observe(&self, outcome: &str, elapsed: Duration) {
        self.duration
            .with_label_values(&[outcome])
            .observe(elapsed.as_secs_f64());
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}
