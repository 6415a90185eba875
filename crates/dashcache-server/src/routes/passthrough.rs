//! Fallback route forwarding everything else to the backend unchanged.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{OriginalUri, State};
use axum::http::header::{self, HeaderName};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::http::Response as HttpResponse;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::state::AppState;

/// Headers that describe the backend connection, not the payload.
const HOP_BY_HOP: [HeaderName; 4] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
];

/// Fallback: GET the same path and query from the backend and stream the
/// reply back with its status and headers.
pub async fn passthrough(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    match forward(&state, &uri, &headers).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!("passthrough {} failed: {}", uri, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn forward(state: &AppState, uri: &Uri, headers: &HeaderMap) -> reqwest::Result<Response> {
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let target = format!("{}{}", state.config.backend_url, path);
    debug!("passthrough -> {}", target);

    let mut request = state.http.get(&target);
    if let Some(encoding) = headers.get(header::ACCEPT_ENCODING) {
        request = request.header(header::ACCEPT_ENCODING, encoding.clone());
    }
    let upstream = request.send().await?;

    let mut builder = HttpResponse::builder().status(upstream.status());
    if let Some(out) = builder.headers_mut() {
        for (name, value) in upstream.headers() {
            if !HOP_BY_HOP.contains(name) {
                out.append(name.clone(), value.clone());
            }
        }
    }

    Ok(builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .unwrap_or_else(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()))
}
