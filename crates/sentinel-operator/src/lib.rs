//! # Sentinel Operator
//!
//! Server side of Sentinel's change stream: accepts subscribers over
//! server-sent events, registers them with a [`Hub`](sentinel_realtime::Hub)
//! and fans resource changes out to every subscriber of the changed
//! resource's project.
//!
//! ## Wire format
//!
//! ```text
//! data: {"type":"connected","id":"<connection-id>"}
//!
//! data: <base64 of the JSON ChangedEvent>
//!
//! : keepalive
//!
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use sentinel_auth::StaticApiKeys;
//! use sentinel_operator::SseOperator;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn serve() -> std::io::Result<()> {
//! let operator = Arc::new(
//!     SseOperator::new("/events")
//!         .with_verifier(StaticApiKeys::new().with_key("project-1", "secret")),
//! );
//!
//! let token = CancellationToken::new();
//! let sweeper = operator.clone();
//! tokio::spawn(async move { sweeper.run(token).await });
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, operator.router()).await?;
//! # Ok(())
//! # }
//! ```

mod api;
mod broadcaster;
mod error;
mod operator;
mod stream;

pub use api::StreamParams;
pub use broadcaster::Broadcaster;
pub use error::{ApiError, OperatorError, Result};
pub use operator::{ConnectionHook, ConnectionInfo, SseOperator, DEFAULT_ENDPOINT};
