//! Server transport capability.

use crate::error::Result;
use async_trait::async_trait;
use sentinel_types::ChangedEvent;
use tokio_util::sync::CancellationToken;

/// A server-side transport that fans change events out to subscribers.
///
/// [`SseOperator`](crate::SseOperator) streams over server-sent events. Other
/// transports (a binary RPC stream, for instance) plug in by implementing
/// this trait over their own connection handling.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Deliver an event to every subscriber of its project.
    ///
    /// Returns the number of subscribers that accepted the event.
    async fn broadcast(&self, event: &ChangedEvent) -> Result<usize>;

    /// Run background maintenance until `token` is cancelled.
    async fn run(&self, token: CancellationToken);
}
