//! Rule evaluation: first enabled rule whose condition holds wins.
//!
//! Condition matching is a pluggable capability ([`ConditionEngine`]); the
//! shipped implementation is Rhai ([`RhaiConditionEngine`]).

mod rhai_engine;

pub use rhai_engine::RhaiConditionEngine;

use crate::error::ConditionError;
use crate::metrics;
use crate::state::{Headers, ResponseConfig, Rule};
use serde_json::Value;
use tracing::debug;

/// Request body as seen by rule conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body was sent.
    Empty,
    /// The body parsed as JSON.
    Json(Value),
    /// The body is not JSON; conditions see the raw string.
    Raw(String),
}

impl RequestBody {
    /// Parse a raw body. Malformed JSON is kept as the raw string.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return RequestBody::Empty;
        }
        match serde_json::from_str(raw) {
            Ok(value) => RequestBody::Json(value),
            Err(_) => RequestBody::Raw(raw.to_string()),
        }
    }
}

/// Everything a condition can inspect.
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub body: RequestBody,
    pub method: String,
    pub headers: Headers,
}

impl EvalContext {
    pub fn new(body: &str, method: &str, headers: &Headers) -> Self {
        Self {
            body: RequestBody::parse(body),
            method: method.to_string(),
            headers: headers.clone(),
        }
    }
}

/// An expression language able to decide rule conditions.
pub trait ConditionEngine: Send + Sync {
    /// A condition ready to run.
    type Compiled;

    /// Compile condition text. Syntax errors are `ConditionError::Compile`.
    fn compile(&self, condition: &str) -> Result<Self::Compiled, ConditionError>;

    /// Run a compiled condition. Anything but boolean `true` is `Ok(false)`.
    fn run(&self, compiled: &Self::Compiled, ctx: &EvalContext) -> Result<bool, ConditionError>;
}

/// Picks the response of the first matching rule.
#[derive(Debug, Default)]
pub struct RuleEvaluator<E = RhaiConditionEngine> {
    engine: E,
}

impl<E: ConditionEngine> RuleEvaluator<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Check that a condition compiles, for rejecting bad rules at the boundary.
    pub fn validate(&self, condition: &str) -> Result<(), ConditionError> {
        self.engine.compile(condition).map(|_| ())
    }

    /// Walk `rules` in the order given (ascending priority from the store) and
    /// return the first enabled rule whose condition evaluates to `true`.
    ///
    /// Disabled rules are skipped without compiling. Compile and runtime
    /// failures count as a non-match for that rule only.
    pub fn evaluate(&self, rules: &[Rule], ctx: &EvalContext) -> Option<ResponseConfig> {
        for rule in rules.iter().filter(|r| r.enabled) {
            let outcome = self
                .engine
                .compile(&rule.condition)
                .and_then(|compiled| self.engine.run(&compiled, ctx));

            match outcome {
                Ok(true) => {
                    debug!(rule_id = %rule.id, rule = %rule.name, "Rule matched");
                    return Some(rule.response_config());
                }
                Ok(false) => {}
                Err(e) => {
                    metrics::record_rule_error(e.kind());
                    debug!(rule_id = %rule.id, error = %e, "Rule condition failed, skipping");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rule(condition: &str, priority: i64, status: u16) -> Rule {
        Rule {
            id: format!("rule_{priority}_{status}"),
            name: condition.to_string(),
            condition: condition.to_string(),
            response: json!({"status": status}),
            status_code: status.into(),
            priority,
            enabled: true,
        }
    }

    fn ctx(body: &str) -> EvalContext {
        EvalContext::new(body, "POST", &Headers::new())
    }

    /// Engine where a condition is the literal "true"/"false"/"error".
    #[derive(Default)]
    struct LiteralEngine {
        compiled: AtomicUsize,
    }

    impl ConditionEngine for LiteralEngine {
        type Compiled = String;

        fn compile(&self, condition: &str) -> Result<String, ConditionError> {
            self.compiled.fetch_add(1, Ordering::SeqCst);
            match condition {
                "true" | "false" | "error" => Ok(condition.to_string()),
                other => Err(ConditionError::Compile(format!("unknown literal {other}"))),
            }
        }

        fn run(&self, compiled: &String, _ctx: &EvalContext) -> Result<bool, ConditionError> {
            match compiled.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ConditionError::Runtime("boom".to_string())),
            }
        }
    }

    #[test]
    fn test_request_body_parse() {
        assert_eq!(RequestBody::parse(""), RequestBody::Empty);
        assert_eq!(
            RequestBody::parse(r#"{"a":1}"#),
            RequestBody::Json(json!({"a": 1}))
        );
        assert_eq!(
            RequestBody::parse("not json {"),
            RequestBody::Raw("not json {".to_string())
        );
    }

    #[test]
    fn test_no_rules_is_no_match() {
        let evaluator = RuleEvaluator::new(LiteralEngine::default());
        assert!(evaluator.evaluate(&[], &ctx("")).is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let evaluator = RuleEvaluator::new(LiteralEngine::default());
        let rules = vec![rule("false", 0, 400), rule("true", 1, 201), rule("true", 2, 202)];

        let config = evaluator.evaluate(&rules, &ctx("")).unwrap();
        assert_eq!(config.status_code, 201);
    }

    #[test]
    fn test_disabled_rules_are_not_compiled() {
        let engine = LiteralEngine::default();
        let evaluator = RuleEvaluator::new(engine);
        let mut disabled = rule("true", 0, 500);
        disabled.enabled = false;

        assert!(evaluator.evaluate(&[disabled], &ctx("")).is_none());
        assert_eq!(evaluator.engine().compiled.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failures_are_skipped() {
        let evaluator = RuleEvaluator::new(LiteralEngine::default());
        let rules = vec![
            rule("garbage", 0, 500),
            rule("error", 1, 501),
            rule("true", 2, 200),
        ];

        let config = evaluator.evaluate(&rules, &ctx("")).unwrap();
        assert_eq!(config.status_code, 200);
    }

    #[test]
    fn test_validate_reports_compile_errors() {
        let evaluator = RuleEvaluator::new(LiteralEngine::default());
        assert!(evaluator.validate("true").is_ok());
        assert!(matches!(
            evaluator.validate("nope"),
            Err(ConditionError::Compile(_))
        ));
    }
}
