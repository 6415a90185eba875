//! Dashcache: caching reverse proxy for range queries against a
//! Prometheus-compatible backend.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use dashcache_core::{DashcacheConfig, ListenNetwork};
use dashcache_engine::HttpFetcher;
use dashcache_store::{RangeStore, SqliteRangeStore};

mod error;
mod metrics;
mod routes;
mod state;

use state::AppState;

fn print_usage() {
    println!("Dashcache: caching proxy for Prometheus range queries");
    println!();
    println!("Usage: dashcache [options]");
    println!();
    println!("Options:");
    println!("  --backend-url <url>        Backend base URL (alias: --prom-url)");
    println!("  --net <tcp|unix>           Listener network (default: tcp)");
    println!("  --addr <addr>              Listen address or socket path (default: :9090)");
    println!("  --db-path <path>           Cache database file (default: data/dashcache.db)");
    println!("  --cache <bool>             Enable the range cache (default: true)");
    println!("  --no-cache                 Disable the range cache");
    println!("  --max-splice-depth <n>     Cached segments spliced per request (default: 8)");
    println!("  help                       Show this help message");
    println!();
    println!("Every option can also be set as DASHCACHE_<NAME>, e.g. DASHCACHE_BACKEND_URL.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if let Some("--help" | "-h" | "help") = args.get(1).map(String::as_str) {
        print_usage();
        return Ok(());
    }

    // Initialize configuration
    let mut config = DashcacheConfig::from_env()?;
    config.apply_args(args.iter().skip(1))?;
    config.validate()?;
    info!(
        "Backend: {} cache={} max_splice_depth={}",
        config.backend_url, config.engine.cache_enabled, config.engine.max_splice_depth
    );

    // Initialize store
    let store: Arc<dyn RangeStore> = Arc::new(
        SqliteRangeStore::open(&config.db_path)
            .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?,
    );

    let http = reqwest::Client::new();
    let fetcher = Arc::new(HttpFetcher::new(http.clone(), config.backend_url.as_str()));

    // Build application state
    let state = Arc::new(AppState::new(config.clone(), store, fetcher, http)?);

    // Build router
    let app = routes::build_router(state);

    // Start server
    match config.network {
        ListenNetwork::Tcp => {
            let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
            info!("Dashcache listening on {}", config.listen_addr);
            axum::serve(listener, app).await?;
        }
        #[cfg(unix)]
        ListenNetwork::Unix => {
            let path = std::path::Path::new(&config.listen_addr);
            if path.exists() {
                std::fs::remove_file(path)?;
            }
            let listener = tokio::net::UnixListener::bind(path)?;
            info!("Dashcache listening on unix:{}", path.display());
            axum::serve(listener, app).await?;
        }
        #[cfg(not(unix))]
        ListenNetwork::Unix => {
            anyhow::bail!("unix sockets are not supported on this platform");
        }
    }

    Ok(())
}
