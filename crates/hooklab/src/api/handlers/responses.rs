//! Response config handlers.

use crate::api::types::{
    error_response, json_response, query_param, read_body_capped, ApiBody, StatusOk,
};
use crate::api::ApiContext;
use crate::state::{ResponseConfig, DEFAULT_KEY};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Current response config for a key
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConfigView<'a> {
    pub response: &'a Value,
    pub status_code: u16,
    pub key: &'a str,
}

/// GET /api/response[/:key] - Resolved response config
pub fn handle_get(path: &str, query: Option<&str>, ctx: &ApiContext) -> Response<ApiBody> {
    let key = response_key(path, query);
    let config = ctx.state().response_config(&key);
    json_response(
        StatusCode::OK,
        &ResponseConfigView {
            response: &config.response,
            status_code: config.status_code,
            key: &key,
        },
    )
}

/// POST /api/response[/:key] - Replace the response config
///
/// `statusCode` is optional; without it the key keeps its currently resolved
/// status.
pub async fn handle_set(
    path: &str,
    query: Option<&str>,
    req: Request<Incoming>,
    ctx: &ApiContext,
) -> Response<ApiBody> {
    let body = match read_body_capped(req.into_body(), ctx.config.max_body_bytes).await {
        Ok(b) => b,
        Err(e) => {
            warn!("Failed to read response config body: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error reading request body",
            );
        }
    };

    let mut payload: Map<String, Value> = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid JSON"),
    };

    let key = response_key(path, query);
    let status_code = payload
        .get("statusCode")
        .and_then(Value::as_f64)
        .map(|code| code as u16)
        .unwrap_or_else(|| ctx.state().response_config(&key).status_code);

    let config = ResponseConfig {
        response: payload.remove("response").unwrap_or(Value::Null),
        response_raw: String::from_utf8_lossy(&body).into_owned(),
        status_code,
    };
    ctx.state().set_response_config(&key, config);
    info!(key = %key, status_code, "Response config updated");

    json_response(StatusCode::OK, &StatusOk::ok())
}

/// Key from `?key=`, else the path after `/api/response/`, else "default".
pub fn response_key(path: &str, query: Option<&str>) -> String {
    if let Some(key) = query_param(query, "key") {
        return key;
    }
    let key = path.strip_prefix("/api/response").unwrap_or(path);
    let key = key.strip_prefix('/').unwrap_or(key);
    if key.is_empty() {
        DEFAULT_KEY.to_string()
    } else {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_key_resolution() {
        assert_eq!(response_key("/api/response", None), "default");
        assert_eq!(response_key("/api/response/", None), "default");
        assert_eq!(response_key("/api/response/orders", None), "orders");
        assert_eq!(
            response_key("/api/response/orders", Some("key=payments")),
            "payments"
        );
        assert_eq!(response_key("/api/response", Some("key=")), "default");
    }
}
