//! Hooklab: webhook capture and mock-response server.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod rules;
pub mod state;
pub mod stream;

pub use coordinator::{RequestCoordinator, WebhookRequest};
pub use state::AppState;
