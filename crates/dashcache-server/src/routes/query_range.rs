//! Cached range-query route.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{OriginalUri, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tracing::{error, info_span, Instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/query_range", get(query_range))
        .layer(CompressionLayer::new())
}

/// GET /api/v1/query_range: answered from the range cache where possible.
async fn query_range(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let span = info_span!("query_range", request_id = %Uuid::new_v4());

    async move {
        match state.engine.query_range(&target).await {
            Ok(answer) => {
                state.metrics.observe(answer.status.as_str(), answer.elapsed);
                Ok(([(CONTENT_TYPE, "application/json")], answer.body).into_response())
            }
            Err(e) => {
                state.metrics.observe("error", started.elapsed());
                error!("query_range {} failed: {}", target, e);
                Err(ApiError::from(e))
            }
        }
    }
    .instrument(span)
    .await
}
