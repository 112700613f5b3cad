use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::services::jobs::JobError;

/// Error type for HTTP handlers. Renders as `{"error": ..., "code": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Listing parameters that could not be parsed at all.
    #[error("Invalid pagination: {0}")]
    InvalidQuery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Job(err) => match err {
                JobError::InvalidSpecification(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_SPECIFICATION", err.to_string())
                }
                JobError::InvalidPagination { .. } => {
                    (StatusCode::BAD_REQUEST, "INVALID_PAGINATION", err.to_string())
                }
                JobError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                JobError::NotReady { .. } => (StatusCode::BAD_REQUEST, "NOT_READY", err.to_string()),
                JobError::ArtifactMissing(_) => {
                    (StatusCode::NOT_FOUND, "ARTIFACT_MISSING", err.to_string())
                }
                JobError::JobActive(_) => (StatusCode::CONFLICT, "JOB_ACTIVE", err.to_string()),
                JobError::Store(_) | JobError::Io(_) => {
                    tracing::error!(error = %err, "Job service error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::InvalidQuery(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_PAGINATION", msg.clone())
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}
