//! # Sentinel Agent
//!
//! Subscriber side of Sentinel's change stream. An [`SseSubscriber`] keeps a
//! server-sent event stream open, reconnecting with a fixed delay, and
//! decodes every frame into a [`ResourceUpdate`]. The [`Agent`] writes each
//! update to a local [`Persister`](sentinel_storage::Persister) and then
//! signals the application through a small, lossy notification queue.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sentinel_agent::{Agent, AgentConfig, SseSubscriber, SubscriberConfig};
//! use sentinel_storage::MemoryPersister;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn listen() -> sentinel_agent::Result<()> {
//! let subscriber = SseSubscriber::new(
//!     SubscriberConfig::new("http://127.0.0.1:8080/events")
//!         .with_credentials("secret", "project-1")
//!         .with_max_retries(5),
//! )?;
//!
//! let (agent, mut updates) = Agent::new(Arc::new(MemoryPersister::new()), AgentConfig::default());
//! tokio::spawn(async move {
//!     while let Some(update) = updates.recv().await {
//!         println!("{} changed", update.resource.key());
//!     }
//! });
//!
//! agent.run(&subscriber, CancellationToken::new()).await
//! # }
//! ```

mod agent;
pub mod config;
pub mod decoder;
mod error;
mod handler;
mod snapshot;
mod subscriber;

pub use agent::{Agent, AgentStats};
pub use config::{AgentConfig, SubscriberConfig};
pub use decoder::{FrameParser, RawEvent};
pub use error::{AgentError, Result};
pub use handler::{ResourceUpdate, UpdateHandler};
pub use snapshot::SnapshotClient;
pub use subscriber::{SseSubscriber, Subscriber};
