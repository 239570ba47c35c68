//! Request context, method guards, interceptors and the authorization hook.
//!
//! The core never evaluates policy itself: an [`Authorizer`] decides, per
//! operation, whether a request may proceed and which extra filter to AND
//! into it. Guards and interceptors are per-operation hooks configured
//! through [`crate::config::OperationOptions`].

use crate::error::ResolverError;
use crate::query::Filter;
use crate::resolver::OperationDescriptor;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Caller identity and request-scoped attributes. Never stored by a resolver.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub principal: Option<String>,
    pub request_id: Option<String>,
    pub claims: Map<String, Value>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_principal(principal: impl Into<String>) -> Self {
        RequestContext {
            principal: Some(principal.into()),
            ..Self::default()
        }
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.claims.insert(key.into(), value);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AuthorizationDecision {
    Allow,
    /// Allow, restricted to records matching the filter.
    Restrict(Filter),
    Deny(String),
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, ctx: &RequestContext, operation: &OperationDescriptor) -> AuthorizationDecision;

    async fn authorize_relation(&self, _ctx: &RequestContext, _relation: &str) -> AuthorizationDecision {
        AuthorizationDecision::Allow
    }
}

/// Synchronous predicate run before an operation; `false` rejects the request.
pub trait Guard: Send + Sync {
    fn can_activate(&self, ctx: &RequestContext, operation: &str) -> bool;
}

impl<F> Guard for F
where
    F: Fn(&RequestContext, &str) -> bool + Send + Sync,
{
    fn can_activate(&self, ctx: &RequestContext, operation: &str) -> bool {
        self(ctx, operation)
    }
}

/// Runs after guards and before the authorizer; an error aborts the request.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, ctx: &RequestContext, operation: &str) -> Result<(), ResolverError>;
}

/// Fold an authorization decision into the request filter.
pub(crate) fn apply_decision(decision: AuthorizationDecision, operation: &str) -> Result<Filter, ResolverError> {
    match decision {
        AuthorizationDecision::Allow => Ok(Filter::default()),
        AuthorizationDecision::Restrict(filter) => Ok(filter),
        AuthorizationDecision::Deny(reason) => {
            tracing::warn!(operation = %operation, reason = %reason, "authorization denied");
            Err(ResolverError::Authorization(format!("{}: {}", operation, reason)))
        }
    }
}
