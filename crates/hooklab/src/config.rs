//! Configuration: command-line flags and the optional YAML seed file.

use crate::error::ConfigError;
use crate::rules::{ConditionEngine, RuleEvaluator};
use crate::state::{AppState, ResponseConfig, Rule, DEFAULT_KEY};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default request-body cap (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Webhook capture and mock-response server
#[derive(Parser, Debug, Clone)]
#[command(name = "hooklab", author, version, about, long_about = None)]
pub struct Args {
    /// Port for the HTTP server
    #[arg(short, long, env = "HOOKLAB_PORT", default_value = "8080")]
    pub port: u16,

    /// Address to listen on
    #[arg(long, env = "HOOKLAB_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// JSON returned for keys without their own configuration
    #[arg(short, long, env = "HOOKLAB_RESPONSE", default_value = r#"{"result":"ok"}"#)]
    pub response: String,

    /// YAML file with response configs and rules to load at startup
    #[arg(short, long, env = "HOOKLAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seconds between keep-alive comments on idle event streams
    #[arg(long, env = "HOOKLAB_HEARTBEAT_SECS", default_value = "25")]
    pub heartbeat_secs: u64,

    /// Request bodies are truncated to this many bytes
    #[arg(long, env = "HOOKLAB_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "HOOKLAB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "HOOKLAB_LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl Args {
    /// The "default" response config built from `--response`.
    pub fn default_response(&self) -> Result<ResponseConfig, ConfigError> {
        let response =
            serde_json::from_str(&self.response).map_err(ConfigError::InvalidDefaultResponse)?;
        Ok(ResponseConfig {
            response,
            response_raw: self.response.clone(),
            status_code: 200,
        })
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            addr: SocketAddr::new(self.host, self.port),
            heartbeat: Duration::from_secs(self.heartbeat_secs.max(1)),
            max_body_bytes: self.max_body_bytes,
        }
    }

    pub fn seed(&self) -> Result<Option<SeedFile>, ConfigError> {
        self.config.as_deref().map(SeedFile::from_path).transpose()
    }
}

/// Runtime settings for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub heartbeat: Duration,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080),
            heartbeat: crate::stream::DEFAULT_HEARTBEAT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Startup seed: response configs and rule sets keyed by webhook key.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub responses: BTreeMap<String, ResponseConfig>,
    #[serde(default)]
    pub rules: BTreeMap<String, Vec<Rule>>,
}

impl SeedFile {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate every rule condition, then install configs and rule sets.
    /// Nothing is installed if any condition is invalid.
    pub fn apply<E: ConditionEngine>(
        self,
        state: &AppState,
        evaluator: &RuleEvaluator<E>,
    ) -> Result<(), ConfigError> {
        for (key, rules) in &self.rules {
            for rule in rules.iter().filter(|r| !r.condition.is_empty()) {
                evaluator
                    .validate(&rule.condition)
                    .map_err(|source| ConfigError::InvalidRule {
                        key: key.clone(),
                        name: rule.name.clone(),
                        source,
                    })?;
            }
        }

        for (key, mut config) in self.responses {
            if config.response_raw.is_empty() {
                config.response_raw = config.response.to_string();
            }
            let key = if key.is_empty() { DEFAULT_KEY.to_string() } else { key };
            state.set_response_config(&key, config);
        }

        for (key, rules) in self.rules {
            let imported = state.import_rules(&key, rules);
            info!(key = %key, count = imported.len(), "Loaded rules from config");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RhaiConditionEngine;
    use serde_json::json;
    use std::io::Write;

    const SEED: &str = r#"
responses:
  payments:
    response: {"accepted": true}
    statusCode: 202
rules:
  payments:
    - name: big
      condition: body.amount > 100
      response: {"review": true}
      statusCode: 409
      priority: 1
      enabled: true
    - name: everything
      condition: "true"
      statusCode: 200
      priority: 5
      enabled: true
"#;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["hooklab"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_default_args() {
        let args = args(&[]);
        assert_eq!(args.port, 8080);
        assert_eq!(args.log_format, LogFormat::Text);

        let config = args.server_config();
        assert_eq!(config.heartbeat, Duration::from_secs(25));
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_default_response_from_flag() {
        let args = args(&["--response", r#"{"hello":"world"}"#]);
        let config = args.default_response().unwrap();
        assert_eq!(config.response, json!({"hello": "world"}));
        assert_eq!(config.status_code, 200);
        assert_eq!(config.response_raw, r#"{"hello":"world"}"#);
    }

    #[test]
    fn test_invalid_default_response_is_rejected() {
        let args = args(&["--response", "{not json"]);
        assert!(matches!(
            args.default_response(),
            Err(ConfigError::InvalidDefaultResponse(_))
        ));
    }

    #[test]
    fn test_seed_file_is_applied() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SEED.as_bytes()).unwrap();

        let seed = SeedFile::from_path(file.path()).unwrap();
        let state = AppState::new();
        let evaluator = RuleEvaluator::new(RhaiConditionEngine::new());
        seed.apply(&state, &evaluator).unwrap();

        assert_eq!(state.response_config("payments").status_code, 202);
        let rules = state.rules("payments");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name, "big");
        assert!(rules.iter().all(|r| r.id.starts_with("rule_")));
    }

    #[test]
    fn test_seed_with_invalid_rule_installs_nothing() {
        let seed: SeedFile = serde_yaml::from_str(
            r#"
responses:
  k:
    response: "x"
    statusCode: 200
rules:
  k:
    - name: broken
      condition: "body.amount >"
      enabled: true
"#,
        )
        .unwrap();
        let state = AppState::new();
        let evaluator = RuleEvaluator::new(RhaiConditionEngine::new());

        let err = seed.apply(&state, &evaluator).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { .. }));
        assert!(state.rules("k").is_empty());
        assert_eq!(state.keys(), vec!["default"]);
    }

    #[test]
    fn test_missing_seed_file_is_an_error() {
        let err = SeedFile::from_path(Path::new("/nonexistent/hooklab.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
