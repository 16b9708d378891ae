//! Route dispatch logic for the HTTP API.

use crate::api::handlers::{events, responses, rules, system, webhook};
use crate::api::types::{method_not_allowed, not_found, ApiBody};
use crate::api::ApiContext;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// Parsed route
#[derive(Debug, PartialEq, Eq)]
enum Route {
    /// ANY /webhook, /webhook/:key
    Webhook,
    /// GET /api/events
    Events,
    /// GET /api/stream
    Stream,
    /// GET/POST /api/response, /api/response/:key
    Response,
    /// GET/POST/PUT/DELETE /api/rules
    Rules,
    /// POST /api/rules/import
    RulesImport,
    /// GET /api/keys
    Keys,
    /// GET /health
    Health,
    /// GET /metrics
    Metrics,
}

impl Route {
    fn parse(path: &str) -> Option<Self> {
        match path {
            "/webhook" => Some(Route::Webhook),
            "/api/events" => Some(Route::Events),
            "/api/stream" => Some(Route::Stream),
            "/api/response" => Some(Route::Response),
            "/api/rules" => Some(Route::Rules),
            "/api/rules/import" => Some(Route::RulesImport),
            "/api/keys" => Some(Route::Keys),
            "/health" => Some(Route::Health),
            "/metrics" => Some(Route::Metrics),
            _ if path.starts_with("/webhook/") => Some(Route::Webhook),
            _ if path.starts_with("/api/response/") => Some(Route::Response),
            _ => None,
        }
    }
}

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    ctx: Arc<ApiContext>,
) -> Result<Response<ApiBody>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|s| s.to_string());
    let query = query.as_deref();

    debug!("API: {} {}", method, path);

    let Some(route) = Route::parse(&path) else {
        return Ok(not_found());
    };

    let response = match (route, &method) {
        (Route::Webhook, _) => webhook::handle_webhook(req, ctx).await,

        (Route::Events, &Method::GET) => events::handle_list(query, &ctx),
        (Route::Stream, &Method::GET) => events::handle_stream(ctx),

        (Route::Response, &Method::GET) => responses::handle_get(&path, query, &ctx),
        (Route::Response, &Method::POST) => responses::handle_set(&path, query, req, &ctx).await,

        (Route::Rules, &Method::GET) => rules::handle_list(query, &ctx),
        (Route::Rules, &Method::POST) => rules::handle_create(query, req, &ctx).await,
        (Route::Rules, &Method::PUT) => rules::handle_update(query, req, &ctx).await,
        (Route::Rules, &Method::DELETE) => rules::handle_delete(query, &ctx),
        (Route::RulesImport, &Method::POST) => rules::handle_import(query, req, &ctx).await,

        (Route::Keys, &Method::GET) => system::handle_keys(&ctx),
        (Route::Health, &Method::GET) => system::handle_health(),
        (Route::Metrics, &Method::GET) => system::handle_metrics(),

        _ => method_not_allowed(),
    };
    Ok(response)
}
