//! Error types for the auth crate.

use thiserror::Error;

/// Errors that can occur in credential and permission checks.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credentials were missing or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested grant was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;
