//! Storage error types.

use thiserror::Error;

/// Errors that can occur during persister operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored resource could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The query or key is missing a required part.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// A specialized Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
