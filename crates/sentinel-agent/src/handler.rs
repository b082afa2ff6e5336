//! Receivers of decoded updates.

use async_trait::async_trait;
use sentinel_types::{Action, Resource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A resource delivered by the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUpdate {
    /// The change that produced it, `None` for bare resource frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    /// The resource snapshot.
    pub resource: Resource,
}

impl ResourceUpdate {
    /// Whether the update removes the resource.
    pub fn is_delete(&self) -> bool {
        self.action == Some(Action::Delete)
    }
}

/// Called once per decoded update, in stream order.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    /// Handle one update. Failures are the handler's to report.
    async fn handle(&self, update: ResourceUpdate);
}

#[async_trait]
impl<T: UpdateHandler + ?Sized> UpdateHandler for Arc<T> {
    async fn handle(&self, update: ResourceUpdate) {
        (**self).handle(update).await
    }
}
