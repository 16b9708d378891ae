//! Live event streaming for a single subscriber.
//!
//! Each iteration waits on exactly one of: cancellation, the heartbeat timer,
//! or the subscriber's mailbox. Cancellation and a closed mailbox both end the
//! stream.

use crate::state::{AppState, Event, Subscriber, SubscriberId};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Default keep-alive interval for idle streams.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(25);

/// One unit written to a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Heartbeat,
    Event(Event),
}

impl StreamFrame {
    /// Server-sent-events framing: a comment line for heartbeats, a `data:`
    /// line with the JSON event otherwise. Each frame ends with a blank line.
    pub fn to_sse(&self) -> Option<Bytes> {
        match self {
            StreamFrame::Heartbeat => Some(Bytes::from_static(b": ping\n\n")),
            StreamFrame::Event(event) => match serde_json::to_string(event) {
                Ok(json) => Some(Bytes::from(format!("data: {json}\n\n"))),
                Err(e) => {
                    warn!(event_id = event.id, "Failed to serialize event: {}", e);
                    None
                }
            },
        }
    }
}

/// A subscriber's stream. Dropping it detaches the subscriber.
pub struct EventStream {
    state: Arc<AppState>,
    id: SubscriberId,
    subscriber: Subscriber,
    heartbeat: Interval,
    cancel: CancellationToken,
}

impl EventStream {
    /// Subscribe to `state` and start the heartbeat timer. The first
    /// heartbeat fires one full period after attaching.
    pub fn attach(state: Arc<AppState>, heartbeat: Duration, cancel: CancellationToken) -> Self {
        let subscriber = state.subscribe();
        let mut heartbeat = interval_at(Instant::now() + heartbeat, heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            id: subscriber.id,
            state,
            subscriber,
            heartbeat,
            cancel,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next frame. `None` means the stream is over.
    pub async fn next_frame(&mut self) -> Option<StreamFrame> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            _ = self.heartbeat.tick() => Some(StreamFrame::Heartbeat),
            event = self.subscriber.receiver.recv() => event.map(StreamFrame::Event),
        }
    }

    /// Turn the stream into encoded SSE chunks, ending when the stream ends.
    pub fn into_sse(self) -> impl futures::Stream<Item = Bytes> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            loop {
                let frame = stream.next_frame().await?;
                if let Some(chunk) = frame.to_sse() {
                    return Some((chunk, stream));
                }
            }
        })
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.state.unsubscribe(self.id);
    }
}
