//! Error types for the agent.

use thiserror::Error;

/// Errors that can occur while subscribing to a stream.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The endpoint is not a valid URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The request could not be sent or the client could not be built.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with something other than `200 OK`.
    #[error("unexpected status: {0}")]
    UnexpectedStatus(u16),

    /// Reading the response body failed.
    #[error("stream error: {0}")]
    Stream(#[source] std::io::Error),

    /// Every allowed attempt failed.
    #[error("failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error of the last attempt.
        #[source]
        source: Box<AgentError>,
    },

    /// A payload could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] sentinel_types::CodecError),

    /// The local persister failed.
    #[error("storage error: {0}")]
    Storage(#[from] sentinel_storage::StorageError),
}

/// A specialized Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
