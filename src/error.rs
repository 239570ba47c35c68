//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Raised while shapes are resolved or resolvers are composed. Never recovered.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid field '{field}' on {shape}: {reason}")]
    InvalidField {
        shape: String,
        field: String,
        reason: String,
    },
    #[error("duplicate operation '{name}' (contributed by {existing} and {incoming})")]
    DuplicateOperation {
        name: String,
        existing: String,
        incoming: String,
    },
    #[error("shape '{0}' is generated twice with different definitions")]
    DuplicateShape(String),
    #[error("duplicate resolver: {0}")]
    DuplicateResolver(String),
    #[error("incompatible paging: {0}")]
    IncompatiblePaging(String),
    #[error("contradictory options: {0}")]
    Contradictory(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Raised while serving a single request.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid paging arguments: {0}")]
    InvalidPagingArguments(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("forbidden: {0}")]
    Authorization(String),
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("backend: {0}")]
    Backend(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ResolverError {
    /// Stable machine-readable code used in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ResolverError::Config(_) => "config_error",
            ResolverError::InvalidPagingArguments(_) => "invalid_paging_arguments",
            ResolverError::NotFound(_) => "not_found",
            ResolverError::Validation(_) => "validation_error",
            ResolverError::Authorization(_) => "forbidden",
            ResolverError::UnknownOperation(_) => "unknown_operation",
            ResolverError::Conflict(_) => "conflict",
            ResolverError::Db(sqlx::Error::RowNotFound) => "not_found",
            ResolverError::Db(_) => "database_error",
            ResolverError::Backend(_) => "backend_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ResolverError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ResolverError::InvalidPagingArguments(_) => StatusCode::BAD_REQUEST,
            ResolverError::NotFound(_) => StatusCode::NOT_FOUND,
            ResolverError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ResolverError::Authorization(_) => StatusCode::FORBIDDEN,
            ResolverError::UnknownOperation(_) => StatusCode::NOT_FOUND,
            ResolverError::Conflict(_) => StatusCode::CONFLICT,
            ResolverError::Db(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ResolverError::Db(_) | ResolverError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ResolverError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
