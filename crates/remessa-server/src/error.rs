use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use remessa_core::{RemessaError, StorageError};
use serde_json::json;
use tracing::error;

/// Errors surfaced by the HTTP handlers, mapped to response status codes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("storage error")]
    Storage(#[from] StorageError),
}

impl From<RemessaError> for ApiError {
    fn from(e: RemessaError) -> Self {
        match e {
            RemessaError::InvalidJob(msg) => ApiError::BadRequest(msg),
            RemessaError::Storage(e) => ApiError::Storage(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Storage(e) => {
                error!(error = %e, "handler storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
