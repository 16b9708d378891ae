//! Bounded, most-recent-first log of captured webhook requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Maximum number of events retained by the log.
pub const MAX_EVENTS: usize = 50;

/// Request headers as a multi-map of canonical name to values in arrival order.
pub type Headers = BTreeMap<String, Vec<String>>;

/// A captured webhook request. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub key: String,
    pub headers: Headers,
    pub body: String,
}

/// Time-ordered event log. The front is the most recent event.
#[derive(Debug)]
pub struct EventLog {
    events: VecDeque<Event>,
    last_id: u64,
    capacity: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_EVENTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            last_id: 0,
            capacity,
        }
    }

    /// Record a request, evicting the oldest entry once the log is full.
    pub fn store(
        &mut self,
        method: &str,
        path: &str,
        key: &str,
        headers: Headers,
        body: String,
    ) -> Event {
        self.last_id += 1;
        let event = Event {
            id: self.last_id,
            timestamp: Utc::now(),
            method: method.to_string(),
            path: path.to_string(),
            key: key.to_string(),
            headers,
            body,
        };

        self.events.push_front(event.clone());
        self.events.truncate(self.capacity);
        event
    }

    /// Snapshot of the log, optionally restricted to one key. `None` and an
    /// empty filter both mean "every key".
    pub fn list(&self, key_filter: Option<&str>) -> Vec<Event> {
        match key_filter.filter(|k| !k.is_empty()) {
            Some(key) => self
                .events
                .iter()
                .filter(|e| e.key == key)
                .cloned()
                .collect(),
            None => self.events.iter().cloned().collect(),
        }
    }

    /// Keys of every retained event.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|e| e.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_n(log: &mut EventLog, n: usize, key: &str) {
        for i in 0..n {
            log.store("POST", "/webhook", key, Headers::new(), format!("{{\"n\":{i}}}"));
        }
    }

    #[test]
    fn test_store_assigns_increasing_ids() {
        let mut log = EventLog::new();
        let first = log.store("POST", "/webhook", "default", Headers::new(), String::new());
        let second = log.store("GET", "/webhook/a", "a", Headers::new(), String::new());

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn test_list_is_most_recent_first() {
        let mut log = EventLog::new();
        store_n(&mut log, 3, "default");

        let ids: Vec<u64> = log.list(None).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_log_keeps_only_most_recent_fifty() {
        let mut log = EventLog::new();
        store_n(&mut log, 75, "default");

        let events = log.list(None);
        assert_eq!(events.len(), MAX_EVENTS);
        assert_eq!(events.first().map(|e| e.id), Some(75));
        assert_eq!(events.last().map(|e| e.id), Some(26));
        assert!(events.windows(2).all(|w| w[0].id == w[1].id + 1));
    }

    #[test]
    fn test_ids_keep_increasing_after_eviction() {
        let mut log = EventLog::with_capacity(2);
        store_n(&mut log, 5, "default");
        let next = log.store("POST", "/webhook", "default", Headers::new(), String::new());
        assert_eq!(next.id, 6);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_list_filters_by_key() {
        let mut log = EventLog::new();
        store_n(&mut log, 2, "alpha");
        store_n(&mut log, 3, "beta");

        assert_eq!(log.list(Some("alpha")).len(), 2);
        assert_eq!(log.list(Some("beta")).len(), 3);
        assert!(log.list(Some("gamma")).is_empty());
        assert_eq!(log.list(Some("")).len(), 5);
    }

    #[test]
    fn test_list_returns_a_snapshot() {
        let mut log = EventLog::new();
        store_n(&mut log, 1, "default");
        let snapshot = log.list(None);
        store_n(&mut log, 1, "default");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_event_serializes_headers_as_arrays() {
        let mut headers = Headers::new();
        headers.insert(
            "X-Trace".to_string(),
            vec!["a".to_string(), "b".to_string()],
        );
        let mut log = EventLog::new();
        let event = log.store("POST", "/webhook/k", "k", headers, "raw".to_string());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["headers"]["X-Trace"], serde_json::json!(["a", "b"]));
        assert_eq!(json["key"], "k");
        assert_eq!(json["body"], "raw");
    }
}
