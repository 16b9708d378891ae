//! Rule management handlers.

use crate::api::types::{
    error_response, json_response, query_param, read_body_capped, ApiBody, StatusOk,
};
use crate::api::ApiContext;
use crate::state::{Rule, DEFAULT_KEY};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// Rules for a key
#[derive(Debug, Serialize)]
pub struct RulesResponse<'a> {
    pub rules: Vec<Rule>,
    pub key: &'a str,
}

/// Request to replace all rules for a key
#[derive(Debug, Deserialize)]
pub struct ImportRulesRequest {
    pub rules: Vec<Rule>,
}

/// Key from `?key=`, defaulting to "default".
pub fn rules_key(query: Option<&str>) -> String {
    query_param(query, "key").unwrap_or_else(|| DEFAULT_KEY.to_string())
}

/// GET /api/rules?key= - Rules sorted by priority
pub fn handle_list(query: Option<&str>, ctx: &ApiContext) -> Response<ApiBody> {
    let key = rules_key(query);
    let rules = ctx.state().rules(&key);
    json_response(StatusCode::OK, &RulesResponse { rules, key: &key })
}

/// POST /api/rules?key= - Add a rule
pub async fn handle_create(
    query: Option<&str>,
    req: Request<Incoming>,
    ctx: &ApiContext,
) -> Response<ApiBody> {
    let key = rules_key(query);
    let rule = match parse_and_validate_rule(req, ctx).await {
        Ok(rule) => rule,
        Err(response) => return response,
    };

    let created = ctx.state().add_rule(&key, rule);
    info!(key = %key, rule_id = %created.id, "Rule created");
    json_response(StatusCode::CREATED, &created)
}

/// PUT /api/rules?key=&id= - Update a rule in place
pub async fn handle_update(
    query: Option<&str>,
    req: Request<Incoming>,
    ctx: &ApiContext,
) -> Response<ApiBody> {
    let key = rules_key(query);
    let Some(id) = query_param(query, "id") else {
        return error_response(StatusCode::BAD_REQUEST, "Rule ID required");
    };
    let rule = match parse_and_validate_rule(req, ctx).await {
        Ok(rule) => rule,
        Err(response) => return response,
    };

    if ctx.state().update_rule(&key, &id, rule) {
        info!(key = %key, rule_id = %id, "Rule updated");
        json_response(StatusCode::OK, &StatusOk::ok())
    } else {
        error_response(StatusCode::NOT_FOUND, "Rule not found")
    }
}

/// DELETE /api/rules?key=&id= - Remove a rule
pub fn handle_delete(query: Option<&str>, ctx: &ApiContext) -> Response<ApiBody> {
    let key = rules_key(query);
    let Some(id) = query_param(query, "id") else {
        return error_response(StatusCode::BAD_REQUEST, "Rule ID required");
    };

    if ctx.state().delete_rule(&key, &id) {
        info!(key = %key, rule_id = %id, "Rule deleted");
        json_response(StatusCode::OK, &StatusOk::ok())
    } else {
        error_response(StatusCode::NOT_FOUND, "Rule not found")
    }
}

/// POST /api/rules/import?key= - Replace every rule for a key
pub async fn handle_import(
    query: Option<&str>,
    req: Request<Incoming>,
    ctx: &ApiContext,
) -> Response<ApiBody> {
    let key = rules_key(query);
    let body = match read_body_capped(req.into_body(), ctx.config.max_body_bytes).await {
        Ok(b) => b,
        Err(e) => {
            warn!("Failed to read rule import body: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error reading request body",
            );
        }
    };

    let import: ImportRulesRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid JSON"),
    };

    for rule in import.rules.iter().filter(|r| !r.condition.is_empty()) {
        if let Err(e) = ctx.coordinator.evaluator().validate(&rule.condition) {
            return json_response(
                StatusCode::BAD_REQUEST,
                &json!({"error": format!("Invalid expression in rule '{}': {e}", rule.name)}),
            );
        }
    }

    let rules = ctx.state().import_rules(&key, import.rules);
    info!(key = %key, count = rules.len(), "Rules imported");
    json_response(StatusCode::OK, &RulesResponse { rules, key: &key })
}

/// Read a rule from the body and check its condition compiles. Empty
/// conditions are accepted as-is; they never match.
async fn parse_and_validate_rule(
    req: Request<Incoming>,
    ctx: &ApiContext,
) -> Result<Rule, Response<ApiBody>> {
    let body = read_body_capped(req.into_body(), ctx.config.max_body_bytes)
        .await
        .map_err(|e| {
            warn!("Failed to read rule body: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error reading request body",
            )
        })?;

    let rule: Rule = serde_json::from_slice(&body)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid JSON"))?;

    if !rule.condition.is_empty() {
        ctx.coordinator
            .evaluator()
            .validate(&rule.condition)
            .map_err(|e| {
                json_response(
                    StatusCode::BAD_REQUEST,
                    &json!({"error": format!("Invalid expression: {e}")}),
                )
            })?;
    }
    Ok(rule)
}
