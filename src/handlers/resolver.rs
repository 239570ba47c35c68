//! Resolver handlers: list, describe, invoke.

use crate::error::ResolverError;
use crate::extractors::Context;
use crate::factory::ResolverRegistry;
use crate::resolver::{GeneratedShape, OperationDescriptor, Resolver};
use crate::response::{success_many, success_one, success_operation};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Serialize)]
pub struct ResolverSummary {
    pub id: String,
    pub shape: String,
    pub type_name: String,
    pub operations: Vec<String>,
}

#[derive(Serialize)]
pub struct ResolverDetail<'a> {
    pub id: &'a str,
    pub operations: &'a [OperationDescriptor],
    pub shapes: &'a [GeneratedShape],
}

fn lookup<'a>(registry: &'a ResolverRegistry, id: &str) -> Result<&'a Arc<Resolver>, ResolverError> {
    registry
        .get(id)
        .ok_or_else(|| ResolverError::NotFound(format!("resolver '{}'", id)))
}

/// Empty bodies are treated as `null` arguments.
fn parse_args(body: &[u8]) -> Result<Value, ResolverError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| ResolverError::Validation(format!("invalid JSON body: {}", e)))
}

pub async fn list_resolvers(State(state): State<AppState>) -> impl IntoResponse {
    let summaries = state
        .registry
        .iter()
        .map(|r| ResolverSummary {
            id: r.id().to_string(),
            shape: r.shape().name.clone(),
            type_name: r.type_name().to_string(),
            operations: r.operations().iter().map(|o| o.name.clone()).collect(),
        })
        .collect();
    success_many(summaries)
}

pub async fn describe_resolver(
    State(state): State<AppState>,
    Path(resolver): Path<String>,
) -> Result<impl IntoResponse, ResolverError> {
    let resolver = lookup(&state.registry, &resolver)?;
    let detail = ResolverDetail {
        id: resolver.id(),
        operations: resolver.operations(),
        shapes: resolver.shapes(),
    };
    Ok(success_one(serde_json::to_value(&detail).map_err(|e| ResolverError::Backend(e.to_string()))?))
}

pub async fn invoke_operation(
    State(state): State<AppState>,
    Path((resolver, operation)): Path<(String, String)>,
    Context(ctx): Context,
    body: Bytes,
) -> Result<impl IntoResponse, ResolverError> {
    let resolver = lookup(&state.registry, &resolver)?;
    let args = parse_args(&body)?;
    let result = resolver.invoke(&operation, args, &ctx).await?;
    Ok(success_operation(result, &operation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_bodies_are_null_arguments() {
        assert_eq!(parse_args(b"").unwrap(), Value::Null);
        assert_eq!(parse_args(b"  \n").unwrap(), Value::Null);
        assert_eq!(parse_args(br#"{"id": 1}"#).unwrap(), serde_json::json!({"id": 1}));
        assert!(matches!(parse_args(b"{"), Err(ResolverError::Validation(_))));
    }
}
