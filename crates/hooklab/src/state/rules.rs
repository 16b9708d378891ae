//! Per-key conditional response rules.

use super::responses::ResponseConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A named, prioritized condition/response pair.
///
/// Fields missing from incoming JSON take their zero values, so a rule posted
/// without `enabled` is stored disabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    /// Boolean expression, e.g. `body.amount > 100`.
    pub condition: String,
    pub response: Value,
    /// Any integer is accepted; codes outside the HTTP range answer 200.
    pub status_code: i64,
    /// Lower values are evaluated first.
    pub priority: i64,
    pub enabled: bool,
}

impl Rule {
    /// The response this rule answers with. Status codes that do not fit a
    /// `u16` become 0, which the HTTP layer answers as 200.
    pub fn response_config(&self) -> ResponseConfig {
        let status_code = u16::try_from(self.status_code).unwrap_or(0);
        ResponseConfig::new(self.response.clone(), status_code)
    }
}

/// Rule sets keyed by webhook key.
///
/// Insertion order is kept; priority order is derived on every `list`.
#[derive(Debug, Default)]
pub struct RuleStore {
    rules: HashMap<String, Vec<Rule>>,
    last_id: u64,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for `key` sorted by ascending priority. Equal priorities keep
    /// insertion order (the sort is stable).
    pub fn list(&self, key: &str) -> Vec<Rule> {
        let mut rules = self.rules.get(key).cloned().unwrap_or_default();
        rules.sort_by_key(|r| r.priority);
        rules
    }

    /// Replace the whole rule set for `key` as given.
    pub fn replace(&mut self, key: &str, rules: Vec<Rule>) {
        self.rules.insert(key.to_string(), rules);
    }

    /// Append a rule under a freshly generated ID and return the stored copy.
    pub fn add(&mut self, key: &str, mut rule: Rule) -> Rule {
        rule.id = self.next_id();
        self.rules.entry(key.to_string()).or_default().push(rule.clone());
        rule
    }

    /// Replace every field but the ID of rule `id`. Returns false when absent.
    pub fn update(&mut self, key: &str, id: &str, mut updated: Rule) -> bool {
        let Some(slot) = self
            .rules
            .get_mut(key)
            .and_then(|rules| rules.iter_mut().find(|r| r.id == id))
        else {
            return false;
        };

        updated.id = id.to_string();
        *slot = updated;
        true
    }

    /// Remove rule `id`. Returns false when absent.
    pub fn delete(&mut self, key: &str, id: &str) -> bool {
        let Some(rules) = self.rules.get_mut(key) else {
            return false;
        };
        match rules.iter().position(|r| r.id == id) {
            Some(index) => {
                rules.remove(index);
                true
            }
            None => false,
        }
    }

    /// Every key that has ever held a rule set.
    pub fn all_keys(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Generate the next rule ID. IDs are never reused.
    pub fn next_id(&mut self) -> String {
        self.last_id += 1;
        format!("rule_{}", self.last_id)
    }
}
