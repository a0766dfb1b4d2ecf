//! HTTP error taxonomy.
//!
//! One enum, one status per class: validation → 400, bad credential/session
//! → 401, missing grant → 403, absent record → 404, everything upstream →
//! 500 with a generic body. Upstream detail is logged at conversion time
//! and never echoed to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<loghouse_client::PublishError> for ApiError {
    fn from(e: loghouse_client::PublishError) -> Self {
        use loghouse_client::PublishError;
        match e {
            PublishError::Unauthorized(_) => {
                ApiError::Unauthorized("Invalid API key for this project".into())
            }
            PublishError::BadRequest(m) => ApiError::BadRequest(m),
            PublishError::Store(e) => {
                tracing::error!(error = %e, "Access store failure during ingestion");
                ApiError::Internal
            }
            PublishError::Bus(e) => {
                tracing::error!(error = %e, "Publish to bus failed");
                ApiError::Internal
            }
            PublishError::Config(e) => {
                tracing::error!(error = %e, "Publisher misconfigured");
                ApiError::Internal
            }
        }
    }
}

impl From<loghouse_query::QueryError> for ApiError {
    fn from(e: loghouse_query::QueryError) -> Self {
        use loghouse_query::QueryError;
        match e {
            QueryError::InvalidFilter(m) => ApiError::BadRequest(m),
            QueryError::NotFound => ApiError::NotFound("Log not found".into()),
            QueryError::CorruptPayload(m) => {
                tracing::error!(error = %m, "Corrupt stored payload");
                ApiError::Internal
            }
            QueryError::Store(e) => {
                tracing::error!(error = %e, "Index store failure during query");
                ApiError::Internal
            }
        }
    }
}

impl From<loghouse_store::StoreError> for ApiError {
    fn from(e: loghouse_store::StoreError) -> Self {
        tracing::error!(error = %e, "Store failure");
        ApiError::Internal
    }
}
