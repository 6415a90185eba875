//! Proxy introspection routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/metrics2", get(get_metrics))
        .route("/dashcache/stats", get(get_stats))
}

/// GET /metrics2: the proxy's own metrics. Not `/metrics`, which is passed
/// through to the backend.
async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(CONTENT_TYPE, state.metrics.content_type())],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// GET /dashcache/stats: range store statistics.
async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.stats() {
        Ok(stats) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "entries": stats.total_entries,
                "queryKeys": stats.distinct_queries,
                "bodyBytes": stats.body_bytes,
                "location": stats.location,
                "cacheEnabled": state.config.engine.cache_enabled,
                "maxSpliceDepth": state.config.engine.max_splice_depth,
                "backend": state.config.backend_url,
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
