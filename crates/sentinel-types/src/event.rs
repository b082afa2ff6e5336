//! Change events produced by the application.

use crate::resource::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The resource was created.
    Create,
    /// The resource was updated.
    Update,
    /// The resource was deleted.
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// One state change of a resource, fanned out to every subscriber of
/// `resource.project_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedEvent {
    /// The change.
    pub action: Action,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
    /// Snapshot of the resource after the change.
    pub resource: Resource,
}

impl ChangedEvent {
    /// Create an event stamped with the current time.
    pub fn new(action: Action, resource: Resource) -> Self {
        Self {
            action,
            timestamp: Utc::now(),
            resource,
        }
    }

    /// Project the event is routed to.
    pub fn project_id(&self) -> &str {
        &self.resource.project_id
    }
}
