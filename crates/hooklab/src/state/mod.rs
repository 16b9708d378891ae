//! Shared in-memory state: captured events, response configs, rules and the
//! live subscriber registry.
//!
//! All four stores sit behind one lock. Every public method holds it only for
//! its own state access, so no call keeps it across I/O or rule evaluation.

mod events;
mod hub;
mod responses;
mod rules;

pub use events::{Event, EventLog, Headers, MAX_EVENTS};
pub use hub::{BroadcastReport, Subscriber, SubscriberHub, SubscriberId, SUBSCRIBER_BUFFER};
pub use responses::{ResponseConfig, ResponseConfigStore, DEFAULT_KEY};
pub use rules::{Rule, RuleStore};

use crate::metrics;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Stores {
    events: EventLog,
    responses: ResponseConfigStore,
    rules: RuleStore,
    hub: SubscriberHub,
}

/// Application state shared by every request handler and stream.
#[derive(Debug, Default)]
pub struct AppState {
    inner: Mutex<Stores>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Events =====

    pub fn store_event(
        &self,
        method: &str,
        path: &str,
        key: &str,
        headers: Headers,
        body: String,
    ) -> Event {
        self.inner
            .lock()
            .events
            .store(method, path, key, headers, body)
    }

    pub fn events(&self, key_filter: Option<&str>) -> Vec<Event> {
        self.inner.lock().events.list(key_filter)
    }

    // ===== Response configs =====

    pub fn response_config(&self, key: &str) -> ResponseConfig {
        self.inner.lock().responses.get(key)
    }

    pub fn set_response_config(&self, key: &str, config: ResponseConfig) {
        self.inner.lock().responses.set(key, config);
    }

    // ===== Rules =====

    pub fn rules(&self, key: &str) -> Vec<Rule> {
        self.inner.lock().rules.list(key)
    }

    pub fn add_rule(&self, key: &str, rule: Rule) -> Rule {
        self.inner.lock().rules.add(key, rule)
    }

    pub fn update_rule(&self, key: &str, id: &str, rule: Rule) -> bool {
        self.inner.lock().rules.update(key, id, rule)
    }

    pub fn delete_rule(&self, key: &str, id: &str) -> bool {
        self.inner.lock().rules.delete(key, id)
    }

    /// Bulk import: give every incoming rule a fresh ID, then replace the
    /// key's whole rule set. Returns the new set in priority order.
    pub fn import_rules(&self, key: &str, rules: Vec<Rule>) -> Vec<Rule> {
        let mut stores = self.inner.lock();
        let rules = rules
            .into_iter()
            .map(|mut rule| {
                rule.id = stores.rules.next_id();
                rule
            })
            .collect();
        stores.rules.replace(key, rules);
        stores.rules.list(key)
    }

    // ===== Subscribers =====
    // Gauge updates stay under the lock; logging waits for the guard to drop.

    pub fn subscribe(&self) -> Subscriber {
        let subscriber = {
            let mut stores = self.inner.lock();
            let subscriber = stores.hub.subscribe();
            metrics::set_stream_subscribers(stores.hub.len());
            subscriber
        };
        debug!(subscriber = ?subscriber.id, "Stream subscriber attached");
        subscriber
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        let removed = {
            let mut stores = self.inner.lock();
            let removed = stores.hub.unsubscribe(id);
            metrics::set_stream_subscribers(stores.hub.len());
            removed
        };
        if removed {
            debug!(subscriber = ?id, "Stream subscriber detached");
        }
    }

    pub fn broadcast(&self, event: &Event) -> BroadcastReport {
        let report = {
            let mut stores = self.inner.lock();
            let report = stores.hub.broadcast(event);
            metrics::set_stream_subscribers(stores.hub.len());
            report
        };
        if report.dropped > 0 {
            metrics::record_dropped_events(report.dropped);
            warn!(
                event_id = event.id,
                dropped = report.dropped,
                "Event skipped for subscribers with a full buffer"
            );
        }
        report
    }

    /// Close every subscriber mailbox. Used once at shutdown.
    pub fn close_subscribers(&self) -> usize {
        let mut stores = self.inner.lock();
        let closed = stores.hub.close_all();
        metrics::set_stream_subscribers(0);
        closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().hub.len()
    }

    // ===== Keys =====

    /// Sorted union of keys seen in events, response configs and rules,
    /// always including "default".
    pub fn keys(&self) -> Vec<String> {
        let stores = self.inner.lock();
        let mut keys: BTreeSet<&str> = BTreeSet::new();
        keys.extend(stores.events.keys());
        keys.extend(stores.responses.keys());
        keys.extend(stores.rules.all_keys());
        keys.insert(DEFAULT_KEY);
        keys.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Counts log events and notes any emitted while the state lock is held.
    struct LockCheck {
        state: Arc<AppState>,
        logged: Arc<AtomicUsize>,
        under_lock: Arc<AtomicBool>,
    }

    impl<S: tracing::Subscriber> Layer<S> for LockCheck {
        fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.logged.fetch_add(1, Ordering::SeqCst);
            if self.state.inner.try_lock().is_none() {
                self.under_lock.store(true, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_fresh_state_has_only_default_key() {
        let state = AppState::new();
        assert_eq!(state.keys(), vec!["default"]);
    }

    #[test]
    fn test_keys_union_is_sorted() {
        let state = AppState::new();
        state.set_response_config("alpha", ResponseConfig::new(json!({}), 200));
        state.store_event("POST", "/webhook/beta", "beta", Headers::new(), String::new());
        state.add_rule(
            "gamma",
            Rule {
                name: "r".to_string(),
                ..Default::default()
            },
        );

        assert_eq!(state.keys(), vec!["alpha", "beta", "default", "gamma"]);
    }

    #[test]
    fn test_keys_are_deduplicated() {
        let state = AppState::new();
        state.set_response_config("default", ResponseConfig::fallback());
        state.store_event("POST", "/webhook/a", "a", Headers::new(), String::new());
        state.store_event("POST", "/webhook/a", "a", Headers::new(), String::new());
        state.set_response_config("a", ResponseConfig::fallback());

        assert_eq!(state.keys(), vec!["a", "default"]);
    }

    #[test]
    fn test_import_assigns_fresh_ids() {
        let state = AppState::new();
        let existing = state.add_rule("k", Rule::default());

        let imported = state.import_rules(
            "k",
            vec![
                Rule {
                    id: existing.id.clone(),
                    priority: 2,
                    ..Default::default()
                },
                Rule {
                    priority: 1,
                    ..Default::default()
                },
            ],
        );

        assert_eq!(imported.len(), 2);
        assert!(imported.iter().all(|r| r.id != existing.id));
        assert_eq!(imported[0].priority, 1);
        assert_ne!(imported[0].id, imported[1].id);
    }

    #[test]
    fn test_close_subscribers_empties_registry() {
        let state = AppState::new();
        let mut sub = state.subscribe();
        assert_eq!(state.subscriber_count(), 1);

        assert_eq!(state.close_subscribers(), 1);
        assert_eq!(state.subscriber_count(), 0);
        assert!(sub.receiver.try_recv().is_err());

        // Detaching after shutdown is a no-op.
        state.unsubscribe(sub.id);
    }

    #[test]
    fn test_subscriber_logging_happens_outside_the_lock() {
        let state = Arc::new(AppState::new());
        let logged = Arc::new(AtomicUsize::new(0));
        let under_lock = Arc::new(AtomicBool::new(false));
        let subscriber = tracing_subscriber::registry().with(LockCheck {
            state: Arc::clone(&state),
            logged: Arc::clone(&logged),
            under_lock: Arc::clone(&under_lock),
        });

        tracing::subscriber::with_default(subscriber, || {
            let sub = state.subscribe();
            let first = state.store_event("POST", "/webhook", "k", Headers::new(), String::new());
            let second = state.store_event("POST", "/webhook", "k", Headers::new(), String::new());
            assert_eq!(state.broadcast(&first).delivered, 1);
            // Full mailbox: the drop is logged
            assert_eq!(state.broadcast(&second).dropped, 1);
            state.unsubscribe(sub.id);
        });

        // attach, drop warning, detach
        assert!(logged.load(Ordering::SeqCst) >= 3);
        assert!(!under_lock.load(Ordering::SeqCst));
    }

    #[test]
    fn test_concurrent_stores_keep_unique_ids() {
        let state = Arc::new(AppState::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    for _ in 0..20 {
                        state.store_event(
                            "POST",
                            "/webhook",
                            &format!("k{t}"),
                            Headers::new(),
                            String::new(),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let events = state.events(None);
        assert_eq!(events.len(), MAX_EVENTS);
        assert_eq!(events[0].id, 160);
        assert!(events.windows(2).all(|w| w[0].id > w[1].id));
    }
}
