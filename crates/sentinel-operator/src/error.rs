//! Error types for the operator.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by broadcast and publish calls.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// The event could not be encoded into a frame.
    #[error("codec error: {0}")]
    Codec(#[from] sentinel_types::CodecError),

    /// The attached persister rejected the change.
    #[error("storage error: {0}")]
    Storage(#[from] sentinel_storage::StorageError),

    /// Listener or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for operator operations.
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Errors surfaced by the HTTP routes.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or rejected credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The requested route or data is not available.
    #[error("not found: {0}")]
    NotFound(String),

    /// The persister failed.
    #[error("storage error: {0}")]
    Storage(#[from] sentinel_storage::StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}
