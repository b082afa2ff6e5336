//! # Sentinel Real-time
//!
//! Connection registry and broadcast hub for Sentinel's server-sent event
//! streams.
//!
//! ## Features
//!
//! - **Connections**: per-subscriber bounded FIFO with idempotent close
//! - **Hub**: project-scoped registry with concurrent, timeout-bounded fan-out
//! - **Health sweep**: removal of closed and stale subscribers
//!
//! ## Example
//!
//! ```rust
//! use sentinel_realtime::Hub;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let hub = Arc::new(Hub::new());
//! let (connection, mut receiver) = hub.connect("project-1");
//!
//! let delivered = hub.broadcast("project-1", "data: aGVsbG8=").await;
//! assert_eq!(delivered, 1);
//! assert_eq!(receiver.recv().await.as_deref(), Some("data: aGVsbG8="));
//!
//! hub.remove("project-1", &connection.id);
//! assert_eq!(hub.total_count(), 0);
//! # }
//! ```
//!
//! A frame is queued on every connection of the project concurrently. A
//! connection whose queue stays full for the send timeout, or that has
//! closed, is evicted; the rest still receive the frame.

pub mod config;
mod connection;
mod error;
mod hub;

pub use config::HubConfig;
pub use connection::{Connection, ConnectionId, ConnectionReceiver};
pub use error::RealtimeError;
pub use hub::{Hub, HubStats};
