//! Per-webhook orchestration: store, broadcast, evaluate rules, fall back.

use crate::metrics;
use crate::rules::{ConditionEngine, EvalContext, RhaiConditionEngine, RuleEvaluator};
use crate::state::{AppState, Event, Headers, ResponseConfig};
use std::sync::Arc;
use tracing::debug;

/// An inbound webhook after the HTTP layer has extracted its parts.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: String,
    pub path: String,
    pub key: String,
    pub headers: Headers,
    pub body: String,
}

/// Ties the stores, the subscriber hub and the rule evaluator together.
#[derive(Debug)]
pub struct RequestCoordinator<E = RhaiConditionEngine> {
    state: Arc<AppState>,
    evaluator: RuleEvaluator<E>,
}

impl RequestCoordinator<RhaiConditionEngine> {
    pub fn new(state: Arc<AppState>) -> Self {
        Self::with_engine(state, RhaiConditionEngine::new())
    }
}

impl<E: ConditionEngine> RequestCoordinator<E> {
    pub fn with_engine(state: Arc<AppState>, engine: E) -> Self {
        Self {
            state,
            evaluator: RuleEvaluator::new(engine),
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn evaluator(&self) -> &RuleEvaluator<E> {
        &self.evaluator
    }

    /// Capture a webhook and push it to live subscribers.
    pub fn ingest(&self, request: &WebhookRequest) -> Event {
        let event = self.state.store_event(
            &request.method,
            &request.path,
            &request.key,
            request.headers.clone(),
            request.body.clone(),
        );
        let report = self.state.broadcast(&event);
        metrics::record_webhook(&request.method);
        debug!(
            event_id = event.id,
            key = %event.key,
            delivered = report.delivered,
            "Webhook captured"
        );
        event
    }

    /// Decide the response: first matching rule, else the config fallback
    /// chain. Rules are snapshotted first so evaluation runs without the lock.
    pub fn decide(&self, key: &str, body: &str, method: &str, headers: &Headers) -> ResponseConfig {
        let rules = self.state.rules(key);
        let ctx = EvalContext::new(body, method, headers);

        match self.evaluator.evaluate(&rules, &ctx) {
            Some(config) => {
                metrics::record_rule_match();
                config
            }
            None => {
                metrics::record_fallback_response();
                self.state.response_config(key)
            }
        }
    }

    /// Full webhook flow: ingest, then decide.
    pub fn handle(&self, request: WebhookRequest) -> (Event, ResponseConfig) {
        let event = self.ingest(&request);
        let config = self.decide(&request.key, &request.body, &request.method, &request.headers);
        (event, config)
    }

    /// Sorted union of every known key, always including "default".
    pub fn keys(&self) -> Vec<String> {
        self.state.keys()
    }
}
