//! Webhook capture handler.

use crate::api::types::{collect_headers, error_response, json_response, read_body_capped, ApiBody};
use crate::api::ApiContext;
use crate::coordinator::WebhookRequest;
use crate::state::DEFAULT_KEY;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

/// ANY /webhook, /webhook/:key - Capture the request and answer with the
/// decided response
pub async fn handle_webhook(req: Request<Incoming>, ctx: Arc<ApiContext>) -> Response<ApiBody> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let key = webhook_key_from_path(&path);
    let headers = collect_headers(req.headers());

    let body = match read_body_capped(req.into_body(), ctx.config.max_body_bytes).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(key = %key, "Failed to read webhook body: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error reading request body",
            );
        }
    };

    let (event, config) = ctx.coordinator.handle(WebhookRequest {
        method,
        path,
        key,
        headers,
        body,
    });

    // Unset or out-of-range codes answer 200
    let status = StatusCode::from_u16(config.status_code).unwrap_or(StatusCode::OK);
    debug!(
        event_id = event.id,
        key = %event.key,
        status = status.as_u16(),
        "Webhook answered"
    );
    json_response(status, &config.response)
}

/// `/webhook` -> "default", `/webhook/a/b` -> "a/b".
pub fn webhook_key_from_path(path: &str) -> String {
    let key = path.strip_prefix("/webhook").unwrap_or(path);
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
    fn test_webhook_key_from_path() {
        assert_eq!(webhook_key_from_path("/webhook"), "default");
        assert_eq!(webhook_key_from_path("/webhook/"), "default");
        assert_eq!(webhook_key_from_path("/webhook/payments"), "payments");
        assert_eq!(webhook_key_from_path("/webhook/a/b"), "a/b");
    }
}
