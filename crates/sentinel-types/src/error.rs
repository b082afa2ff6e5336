//! Error types for encoding and decoding wire payloads.

use thiserror::Error;

/// Errors raised while encoding or decoding resources and frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload was not valid base64.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A frame did not have the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(String),
}
