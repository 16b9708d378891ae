//! System handlers: keys, health, metrics.

use crate::api::types::{build_response_with_headers, full, json_response, ApiBody};
use crate::api::ApiContext;
use crate::metrics::collect_metrics;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Response for key discovery
#[derive(Debug, Serialize)]
pub struct KeysResponse {
    pub keys: Vec<String>,
}

/// GET /api/keys - Every known webhook key, sorted
pub fn handle_keys(ctx: &ApiContext) -> Response<ApiBody> {
    json_response(
        StatusCode::OK,
        &KeysResponse {
            keys: ctx.coordinator.keys(),
        },
    )
}

/// GET /health - Health check
pub fn handle_health() -> Response<ApiBody> {
    json_response(StatusCode::OK, &serde_json::json!({"status": "ok"}))
}

/// GET /metrics - Prometheus metrics
pub fn handle_metrics() -> Response<ApiBody> {
    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        full(collect_metrics()),
    )
}
