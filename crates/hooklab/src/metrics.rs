//! Prometheus metrics for hooklab.
//!
//! Tracks webhook traffic, rule decisions and live stream delivery.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_int_counter, register_int_gauge, CounterVec, Encoder,
    IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    /// Total number of captured webhook requests
    pub static ref WEBHOOKS_TOTAL: CounterVec = register_counter_vec!(
        "hooklab_webhooks_total",
        "Total number of webhook requests captured",
        &["method"]
    )
    .unwrap();

    /// Webhooks answered by a matching rule
    pub static ref RULE_MATCHES_TOTAL: IntCounter = register_int_counter!(
        "hooklab_rule_matches_total",
        "Total number of webhook responses decided by a rule"
    )
    .unwrap();

    /// Webhooks answered by the response-config fallback chain
    pub static ref FALLBACK_RESPONSES_TOTAL: IntCounter = register_int_counter!(
        "hooklab_fallback_responses_total",
        "Total number of webhook responses taken from the response config"
    )
    .unwrap();

    /// Rule conditions that failed to compile or run
    pub static ref RULE_EVALUATION_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "hooklab_rule_evaluation_errors_total",
        "Total number of rule conditions treated as non-matching because of an error",
        &["kind"]  // kind: compile|runtime
    )
    .unwrap();

    /// Currently attached stream subscribers
    pub static ref STREAM_SUBSCRIBERS: IntGauge = register_int_gauge!(
        "hooklab_stream_subscribers",
        "Number of attached event stream subscribers"
    )
    .unwrap();

    /// Events skipped because a subscriber had not drained its buffer
    pub static ref STREAM_EVENTS_DROPPED_TOTAL: IntCounter = register_int_counter!(
        "hooklab_stream_events_dropped_total",
        "Total number of events not delivered to a subscriber with a full buffer"
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Label for a request method. Extension methods share one series.
fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "POST" => "POST",
        "PUT" => "PUT",
        "PATCH" => "PATCH",
        "DELETE" => "DELETE",
        "HEAD" => "HEAD",
        "OPTIONS" => "OPTIONS",
        _ => "OTHER",
    }
}

pub fn record_webhook(method: &str) {
    WEBHOOKS_TOTAL
        .with_label_values(&[method_label(method)])
        .inc();
}

pub fn record_rule_match() {
    RULE_MATCHES_TOTAL.inc();
}

pub fn record_fallback_response() {
    FALLBACK_RESPONSES_TOTAL.inc();
}

pub fn record_rule_error(kind: &str) {
    RULE_EVALUATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn set_stream_subscribers(count: usize) {
    STREAM_SUBSCRIBERS.set(count as i64);
}

pub fn record_dropped_events(count: usize) {
    STREAM_EVENTS_DROPPED_TOTAL.inc_by(count as u64);
}
