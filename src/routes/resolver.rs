//! Resolver routes: discovery and invocation by operation name.

use crate::handlers::resolver::{describe_resolver, invoke_operation, list_resolvers};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// Request bodies above this size are rejected with 413.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// GET /resolvers, GET /resolvers/:resolver/operations, POST /resolvers/:resolver/:operation.
pub fn resolver_routes(state: AppState) -> Router {
    resolver_routes_with_limit(state, DEFAULT_BODY_LIMIT)
}

pub fn resolver_routes_with_limit(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/resolvers", get(list_resolvers))
        .route("/resolvers/:resolver/operations", get(describe_resolver))
        .route("/resolvers/:resolver/:operation", post(invoke_operation))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
