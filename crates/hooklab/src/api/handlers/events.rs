//! Captured event listing and the live event stream.

use crate::api::types::{build_response_with_headers, json_response, query_param, ApiBody};
use crate::api::ApiContext;
use crate::state::Event;
use crate::stream::EventStream;
use futures::StreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// Response for listing events
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
}

/// GET /api/events - Stored events, most recent first, optionally for one key
pub fn handle_list(query: Option<&str>, ctx: &ApiContext) -> Response<ApiBody> {
    let key = query_param(query, "key");
    let events = ctx.state().events(key.as_deref());
    json_response(StatusCode::OK, &EventsResponse { events })
}

/// GET /api/stream - Server-sent events for every captured webhook
pub fn handle_stream(ctx: Arc<ApiContext>) -> Response<ApiBody> {
    let stream = EventStream::attach(
        Arc::clone(ctx.state()),
        ctx.config.heartbeat,
        ctx.shutdown.child_token(),
    );
    debug!(subscriber = ?stream.id(), "Event stream opened");

    let frames = stream
        .into_sse()
        .map(|chunk| Ok::<_, Infallible>(Frame::data(chunk)));

    build_response_with_headers(
        StatusCode::OK,
        [
            ("Content-Type", "text/event-stream"),
            ("Cache-Control", "no-cache"),
            ("Connection", "keep-alive"),
        ],
        StreamBody::new(frames).boxed_unsync(),
    )
}
