//! Error types for the real-time module.

use thiserror::Error;

/// Errors that can occur when delivering frames to a connection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeError {
    /// The connection was closed before or while sending.
    #[error("connection closed")]
    Closed,

    /// The outbound queue stayed full for the whole send timeout.
    #[error("send timed out")]
    Timeout,
}
