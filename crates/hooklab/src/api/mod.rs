//! HTTP surface for hooklab.
//!
//! This module provides:
//! - Webhook capture at `/webhook` and `/webhook/{key}`
//! - The captured event list and the live event stream
//! - Response config and rule management per webhook key
//! - Key discovery, health and metrics endpoints

mod handlers;
mod router;
mod server;
pub mod types;

pub use router::route_request;
pub use server::ApiServer;

use crate::config::ServerConfig;
use crate::coordinator::RequestCoordinator;
use crate::state::AppState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a request handler needs.
#[derive(Debug)]
pub struct ApiContext {
    pub coordinator: RequestCoordinator,
    pub config: ServerConfig,
    /// Cancelled at shutdown; ends every open event stream.
    pub shutdown: CancellationToken,
}

impl ApiContext {
    pub fn new(state: Arc<AppState>, config: ServerConfig, shutdown: CancellationToken) -> Self {
        Self {
            coordinator: RequestCoordinator::new(state),
            config,
            shutdown,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        self.coordinator.state()
    }
}
