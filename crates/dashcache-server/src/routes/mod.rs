//! HTTP route handlers.
//!
//! Range queries go through the cache; every other path is proxied to the
//! backend untouched.

pub mod passthrough;
pub mod query_range;
pub mod stats;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(query_range::routes())
        .merge(stats::routes())
        .fallback(passthrough::passthrough)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::body::Body;
    use axum::extract::Query;
    use axum::http::{header, Request, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Json;
    use dashcache_core::{DashcacheConfig, PromResponse};
    use dashcache_engine::HttpFetcher;
    use dashcache_store::{RangeStore, SqliteRangeStore};
    use serde_json::json;
    use tower::ServiceExt;

    /// Stand-in backend: a one-series matrix with a point per minute, or a
    /// 503 for the query `broken`.
    async fn backend_query_range(Query(params): Query<HashMap<String, String>>) -> Response {
        if params.get("query").map(String::as_str) == Some("broken") {
            return (StatusCode::SERVICE_UNAVAILABLE, "overloaded").into_response();
        }
        let bound = |key: &str| params.get(key).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
        let values: Vec<serde_json::Value> = (bound("start")..bound("end"))
            .step_by(60)
            .map(|t| json!([t, "1"]))
            .collect();
        Json(json!({
            "status": "success",
            "data": {"resultType": "matrix", "result": [{"metric": {"job": "a"}, "values": values}]}
        }))
        .into_response()
    }

    async fn backend_labels() -> impl IntoResponse {
        (
            [("x-backend", "fake")],
            Json(json!({"status": "success", "data": ["job"]})),
        )
    }

    async fn spawn_backend() -> String {
        let app = Router::new()
            .route("/api/v1/query_range", get(backend_query_range))
            .route("/api/v1/labels", get(backend_labels));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn test_app(backend_url: &str) -> (Router, Arc<AppState>) {
        let config = DashcacheConfig {
            backend_url: backend_url.to_string(),
            ..DashcacheConfig::default()
        };
        let store: Arc<dyn RangeStore> = Arc::new(SqliteRangeStore::open_in_memory().unwrap());
        let http = reqwest::Client::new();
        let fetcher = Arc::new(HttpFetcher::new(http.clone(), backend_url));
        let state = Arc::new(AppState::new(config, store, fetcher, http).unwrap());
        (build_router(state.clone()), state)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(resp: Response) -> bytes::Bytes {
        axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap()
    }

    async fn metrics_text(app: &Router) -> String {
        let resp = app.clone().oneshot(get_request("/metrics2")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        String::from_utf8(body_bytes(resp).await.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_query_range_miss_then_hit() {
        let backend = spawn_backend().await;
        let (app, state) = test_app(&backend);
        let uri = "/api/v1/query_range?query=up&start=0&end=600&step=60s";

        let first = app.clone().oneshot(get_request(uri)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[header::CONTENT_TYPE], "application/json");
        let first = body_bytes(first).await;
        let decoded: PromResponse = serde_json::from_slice(&first).unwrap();
        assert!(decoded.is_matrix());
        assert_eq!(decoded.series()[0].samples().len(), 10);

        let second = body_bytes(app.clone().oneshot(get_request(uri)).await.unwrap()).await;
        assert_eq!(first, second);
        assert_eq!(state.store.stats().unwrap().total_entries, 1);

        let text = metrics_text(&app).await;
        assert!(text.contains("dashcache_duration_seconds_count{cache=\"miss\"} 1"));
        assert!(text.contains("dashcache_duration_seconds_count{cache=\"hit\"} 1"));
    }

    #[tokio::test]
    async fn test_query_range_partial_hit() {
        let backend = spawn_backend().await;
        let (app, _state) = test_app(&backend);

        app.clone()
            .oneshot(get_request("/api/v1/query_range?query=up&start=0&end=600&step=60s"))
            .await
            .unwrap();
        let resp = app
            .clone()
            .oneshot(get_request("/api/v1/query_range?query=up&start=300&end=900&step=60s"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let merged: PromResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        let stamps: Vec<i64> = merged.series()[0].samples().iter().map(|s| s.second()).collect();
        assert_eq!(stamps, (300..900).step_by(60).collect::<Vec<i64>>());

        assert!(metrics_text(&app).await.contains("cache=\"partial\""));
    }

    #[tokio::test]
    async fn test_query_range_gzip() {
        let backend = spawn_backend().await;
        let (app, _state) = test_app(&backend);

        let request = Request::builder()
            .uri("/api/v1/query_range?query=up&start=0&end=3600&step=60s")
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(request).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_ENCODING], "gzip");
    }

    #[tokio::test]
    async fn test_query_range_malformed_is_bad_request() {
        let (app, _state) = test_app("http://127.0.0.1:1");
        let resp = app
            .clone()
            .oneshot(get_request("/api/v1/query_range?query=up&start=abc&end=600&step=60s"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(!body_bytes(resp).await.is_empty());
        assert!(metrics_text(&app).await.contains("cache=\"error\""));
    }

    #[tokio::test]
    async fn test_query_range_backend_failure_is_bad_gateway() {
        let backend = spawn_backend().await;
        let (app, state) = test_app(&backend);
        let resp = app
            .oneshot(get_request("/api/v1/query_range?query=broken&start=0&end=600&step=60s"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(state.store.stats().unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_passthrough_copies_status_headers_and_body() {
        let backend = spawn_backend().await;
        let (app, _state) = test_app(&backend);

        let resp = app.oneshot(get_request("/api/v1/labels")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-backend"], "fake");
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(body["data"][0], "job");
    }

    #[tokio::test]
    async fn test_passthrough_adds_no_headers() {
        let backend = spawn_backend().await;
        let (app, _state) = test_app(&backend);

        let request = Request::builder()
            .uri("/api/v1/labels")
            .header(header::ORIGIN, "http://grafana.local")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(request).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp
            .headers()
            .keys()
            .all(|name| !name.as_str().starts_with("access-control-")));
    }

    #[tokio::test]
    async fn test_passthrough_forwards_backend_status() {
        let backend = spawn_backend().await;
        let (app, _state) = test_app(&backend);
        let resp = app.oneshot(get_request("/api/v1/missing")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_passthrough_unreachable_backend() {
        let (app, _state) = test_app("http://127.0.0.1:1");
        let resp = app.oneshot(get_request("/api/v1/labels")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body_bytes(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_stats_shape() {
        let backend = spawn_backend().await;
        let (app, _state) = test_app(&backend);
        app.clone()
            .oneshot(get_request("/api/v1/query_range?query=up&start=0&end=600&step=60s"))
            .await
            .unwrap();

        let resp = app.oneshot(get_request("/dashcache/stats")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let stats: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(stats["entries"], 1);
        assert_eq!(stats["queryKeys"], 1);
        assert!(stats["bodyBytes"].as_i64().unwrap() > 0);
        assert_eq!(stats["location"], ":memory:");
        assert_eq!(stats["cacheEnabled"], true);
    }
}
