//! Per-key static response configuration with a fallback chain.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Key whose configuration answers for every unconfigured key.
pub const DEFAULT_KEY: &str = "default";

/// The response returned for a webhook request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConfig {
    #[serde(default)]
    pub response: Value,
    /// Raw serialized form as it was submitted, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response_raw: String,
    #[serde(default)]
    pub status_code: u16,
}

impl ResponseConfig {
    pub fn new(response: Value, status_code: u16) -> Self {
        Self {
            response,
            response_raw: String::new(),
            status_code,
        }
    }

    /// Built-in `{"result":"ok"}` / 200, used when nothing is configured.
    pub fn fallback() -> Self {
        Self::new(serde_json::json!({"result": "ok"}), 200)
    }
}

/// Response configurations keyed by webhook key.
#[derive(Debug, Default)]
pub struct ResponseConfigStore {
    configs: HashMap<String, ResponseConfig>,
}

impl ResponseConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `key`, then "default", then the built-in fallback.
    pub fn get(&self, key: &str) -> ResponseConfig {
        self.configs
            .get(key)
            .or_else(|| self.configs.get(DEFAULT_KEY))
            .cloned()
            .unwrap_or_else(ResponseConfig::fallback)
    }

    /// Overwrite the configuration for `key`. An empty key means "default".
    pub fn set(&mut self, key: &str, config: ResponseConfig) {
        let key = if key.is_empty() { DEFAULT_KEY } else { key };
        self.configs.insert(key.to_string(), config);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }
}
