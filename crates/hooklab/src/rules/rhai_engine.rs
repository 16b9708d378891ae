use super::{ConditionEngine, EvalContext, RequestBody};
use crate::error::ConditionError;
use crate::state::Headers;
use rhai::{Array, Dynamic, Engine, Map, Scope, AST};
use serde_json::Value;
use std::fmt;

/// Upper bound on work a single condition may perform.
const MAX_OPERATIONS: u64 = 10_000;
const MAX_EXPR_DEPTH: usize = 64;

/// Rhai-backed rule conditions.
///
/// Conditions compile as single expressions, so statements and loops are
/// rejected. The scope exposes `body`, `method` and `headers`.
pub struct RhaiConditionEngine {
    engine: Engine,
}

impl RhaiConditionEngine {
    pub fn new() -> Self {
        Self {
            engine: Self::create_engine(),
        }
    }

    fn create_engine() -> Engine {
        let mut engine = Engine::new();
        engine
            .set_max_operations(MAX_OPERATIONS)
            .set_max_expr_depths(MAX_EXPR_DEPTH, MAX_EXPR_DEPTH)
            // Unknown variables are syntax errors, not runtime surprises
            .set_strict_variables(true);
        engine
    }

    /// Scope with the variables conditions may reference.
    fn scope(ctx: &EvalContext) -> Scope<'static> {
        let mut scope = Scope::new();
        scope.push_dynamic("body", body_to_dynamic(&ctx.body));
        scope.push("method", ctx.method.clone());
        scope.push_dynamic("headers", headers_to_dynamic(&ctx.headers));
        scope
    }

    fn template_scope() -> Scope<'static> {
        let mut scope = Scope::new();
        scope.push_dynamic("body", Dynamic::UNIT);
        scope.push("method", String::new());
        scope.push_dynamic("headers", Dynamic::from_map(Map::new()));
        scope
    }
}

impl Default for RhaiConditionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RhaiConditionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RhaiConditionEngine")
            .field("max_operations", &MAX_OPERATIONS)
            .finish()
    }
}

impl ConditionEngine for RhaiConditionEngine {
    type Compiled = AST;

    fn compile(&self, condition: &str) -> Result<AST, ConditionError> {
        self.engine
            .compile_expression_with_scope(&Self::template_scope(), condition)
            .map_err(|e| ConditionError::Compile(e.to_string()))
    }

    fn run(&self, compiled: &AST, ctx: &EvalContext) -> Result<bool, ConditionError> {
        let mut scope = Self::scope(ctx);
        let result: Dynamic = self
            .engine
            .eval_ast_with_scope(&mut scope, compiled)
            .map_err(|e| ConditionError::Runtime(e.to_string()))?;

        Ok(result.as_bool().unwrap_or(false))
    }
}

fn body_to_dynamic(body: &RequestBody) -> Dynamic {
    match body {
        RequestBody::Empty => Dynamic::UNIT,
        RequestBody::Json(value) => json_to_dynamic(value),
        RequestBody::Raw(raw) => Dynamic::from(raw.clone()),
    }
}

fn headers_to_dynamic(headers: &Headers) -> Dynamic {
    let map: Map = headers
        .iter()
        .map(|(name, values)| {
            let values: Array = values.iter().cloned().map(Dynamic::from).collect();
            (name.as_str().into(), Dynamic::from_array(values))
        })
        .collect();
    Dynamic::from_map(map)
}

pub(crate) fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(arr) => Dynamic::from_array(arr.iter().map(json_to_dynamic).collect()),
        Value::Object(obj) => {
            let map: Map = obj
                .iter()
                .map(|(k, v)| (k.as_str().into(), json_to_dynamic(v)))
                .collect();
            Dynamic::from_map(map)
        }
    }
}
