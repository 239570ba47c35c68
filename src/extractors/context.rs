//! Build a [`RequestContext`] from request headers.

use crate::auth::RequestContext;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Caller identity header. Authentication happens upstream; this only carries the result.
pub const PRINCIPAL_ID_HEADER: &str = "X-Principal-ID";
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Extractor for the request context of a resolver call.
#[derive(Clone, Debug)]
pub struct Context(pub RequestContext);

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Context(RequestContext {
            principal: header(parts, PRINCIPAL_ID_HEADER),
            request_id: header(parts, REQUEST_ID_HEADER),
            ..RequestContext::default()
        }))
    }
}
