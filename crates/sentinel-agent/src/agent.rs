//! Local delivery of streamed updates.

use crate::config::AgentConfig;
use crate::error::Result;
use crate::handler::{ResourceUpdate, UpdateHandler};
use crate::snapshot::SnapshotClient;
use crate::subscriber::Subscriber;
use async_trait::async_trait;
use sentinel_storage::Persister;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Span};

/// Agent statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Updates received from the stream.
    pub delivered: u64,
    /// Updates written to the persister.
    pub persisted: u64,
    /// Updates dropped after every save attempt failed.
    pub persist_failures: u64,
    /// Notifications dropped because the queue was full.
    pub notifications_dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    persisted: AtomicU64,
    persist_failures: AtomicU64,
    notifications_dropped: AtomicU64,
}

/// Writes every streamed update to a persister, then signals the
/// application through a small notification queue.
///
/// The persister is the source of truth. Notifications are coalescing
/// signals: when the queue is full the new one is dropped.
pub struct Agent {
    persister: Arc<dyn Persister>,
    notify: mpsc::Sender<ResourceUpdate>,
    snapshot: Option<SnapshotClient>,
    config: AgentConfig,
    counters: Counters,
    span: Span,
}

impl Agent {
    /// Create an agent and the receiving end of its notification queue.
    pub fn new(
        persister: Arc<dyn Persister>,
        config: AgentConfig,
    ) -> (Self, mpsc::Receiver<ResourceUpdate>) {
        let (notify, receiver) = mpsc::channel(config.notify_capacity.max(1));
        let agent = Self {
            persister,
            notify,
            snapshot: None,
            config,
            counters: Counters::default(),
            span: info_span!("agent"),
        };
        (agent, receiver)
    }

    /// Load the server snapshot before streaming.
    pub fn with_snapshot(mut self, client: SnapshotClient) -> Self {
        self.snapshot = Some(client);
        self
    }

    /// Emit every log line under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The local persister.
    pub fn persister(&self) -> &Arc<dyn Persister> {
        &self.persister
    }

    /// Rehydrate if configured, then stream through `subscriber` until it
    /// returns.
    pub async fn run(&self, subscriber: &dyn Subscriber, token: CancellationToken) -> Result<()> {
        if self.snapshot.is_some() {
            self.rehydrate().await;
        }
        subscriber.connect(self, token).await
    }

    /// Save every resource of the server snapshot. Returns the number saved.
    ///
    /// Failures are logged; streaming can start regardless.
    pub async fn rehydrate(&self) -> usize {
        let Some(client) = &self.snapshot else {
            return 0;
        };

        let resources = match client.fetch().await {
            Ok(resources) => resources,
            Err(err) => {
                warn!(parent: &self.span, error = %err, "Failed to fetch snapshot");
                return 0;
            }
        };

        let total = resources.len();
        let mut saved = 0;
        for resource in resources {
            let key = resource.key();
            match self.persister.save(resource).await {
                Ok(()) => saved += 1,
                Err(err) => warn!(
                    parent: &self.span,
                    resource = %key,
                    error = %err,
                    "Failed to save snapshot resource"
                ),
            }
        }
        info!(parent: &self.span, saved, total, "Rehydrated from snapshot");
        saved
    }

    /// Persist `update`, then try to notify.
    pub async fn deliver(&self, update: ResourceUpdate) {
        self.counters.delivered.fetch_add(1, Ordering::Relaxed);

        match self.persist(&update).await {
            Ok(()) => {
                self.counters.persisted.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.counters.persist_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    parent: &self.span,
                    resource = %update.resource.key(),
                    attempts = self.config.persist_attempts,
                    error = %err,
                    "Failed to persist update, dropping"
                );
            }
        }

        match self.notify.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(update)) => {
                self.counters.notifications_dropped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    parent: &self.span,
                    resource = %update.resource.key(),
                    "Notification queue full, dropping"
                );
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.notifications_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    async fn persist(&self, update: &ResourceUpdate) -> Result<()> {
        let attempts = self.config.persist_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = if update.is_delete() {
                self.persister.remove(&update.resource.key()).await
            } else {
                self.persister.save(update.resource.clone()).await
            };

            match result {
                Ok(()) => return Ok(()),
                Err(err) if attempt >= attempts => return Err(err.into()),
                Err(err) => {
                    debug!(
                        parent: &self.span,
                        attempt,
                        delay_ms = self.config.persist_retry_delay.as_millis() as u64,
                        error = %err,
                        "Persist failed, retrying"
                    );
                    tokio::time::sleep(self.config.persist_retry_delay).await;
                }
            }
        }
    }

    /// Snapshot of agent statistics.
    pub fn stats(&self) -> AgentStats {
        AgentStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            persisted: self.counters.persisted.load(Ordering::Relaxed),
            persist_failures: self.counters.persist_failures.load(Ordering::Relaxed),
            notifications_dropped: self.counters.notifications_dropped.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl UpdateHandler for Agent {
    async fn handle(&self, update: ResourceUpdate) {
        self.deliver(update).await
    }
}
