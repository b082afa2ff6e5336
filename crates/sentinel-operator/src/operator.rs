//! The server-sent event operator.

use crate::broadcaster::Broadcaster;
use crate::error::Result;
use async_trait::async_trait;
use sentinel_auth::{CredentialVerifier, DenyAll};
use sentinel_realtime::{Hub, HubConfig};
use sentinel_storage::Persister;
use sentinel_types::wire::encode_changed_payload;
use sentinel_types::{Action, ChangedEvent};
use std::fmt;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Span};

/// Default path of the stream endpoint.
pub const DEFAULT_ENDPOINT: &str = "/events";

/// Identity of an accepted stream, passed to lifecycle hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Connection id announced in the handshake.
    pub id: String,
    /// Project the stream subscribes to.
    pub project_id: String,
}

/// Callback fired when a stream is accepted or torn down.
pub type ConnectionHook = Arc<dyn Fn(&ConnectionInfo) + Send + Sync>;

/// Accepts subscriber streams and broadcasts change events to them.
///
/// Build one with [`SseOperator::new`], mount [`SseOperator::router`] in an
/// axum server and drive [`SseOperator::run`] in the background for health
/// sweeps.
pub struct SseOperator {
    pub(crate) endpoint: String,
    pub(crate) hub: Arc<Hub>,
    pub(crate) verifier: Arc<dyn CredentialVerifier>,
    pub(crate) persister: Option<Arc<dyn Persister>>,
    pub(crate) on_connected: Option<ConnectionHook>,
    pub(crate) on_disconnected: Option<ConnectionHook>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) span: Span,
}

impl SseOperator {
    /// Create an operator serving streams at `endpoint`.
    ///
    /// Until a verifier is set every stream is rejected.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        if !endpoint.starts_with('/') {
            endpoint.insert(0, '/');
        }
        let span = info_span!("sse_operator", endpoint = %endpoint);
        let hub = Hub::with_config(HubConfig::default()).with_span(info_span!(parent: &span, "hub"));

        Self {
            endpoint,
            hub: Arc::new(hub),
            verifier: Arc::new(DenyAll),
            persister: None,
            on_connected: None,
            on_disconnected: None,
            shutdown: CancellationToken::new(),
            span,
        }
    }

    /// Replace the hub settings.
    pub fn with_hub_config(mut self, config: HubConfig) -> Self {
        self.hub = Arc::new(
            Hub::with_config(config).with_span(info_span!(parent: &self.span, "hub")),
        );
        self
    }

    /// Gate stream accepts with `verifier`.
    pub fn with_verifier(mut self, verifier: impl CredentialVerifier + 'static) -> Self {
        self.verifier = Arc::new(verifier);
        self
    }

    /// Attach a persister for [`publish`](Self::publish) and the snapshot route.
    pub fn with_persister(mut self, persister: Arc<dyn Persister>) -> Self {
        self.persister = Some(persister);
        self
    }

    /// Run `hook` after a stream has been registered.
    pub fn on_connected(mut self, hook: impl Fn(&ConnectionInfo) + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Arc::new(hook));
        self
    }

    /// Run `hook` after a stream has been removed.
    pub fn on_disconnected(
        mut self,
        hook: impl Fn(&ConnectionInfo) + Send + Sync + 'static,
    ) -> Self {
        self.on_disconnected = Some(Arc::new(hook));
        self
    }

    /// Emit every log line under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        let config = self.hub.config().clone();
        self.hub = Arc::new(Hub::with_config(config).with_span(info_span!(parent: &span, "hub")));
        self.span = span;
        self
    }

    /// End every open stream when `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Path of the stream endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The connection registry.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Token that ends every open stream when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Encode `event` and queue it on every stream of its project.
    ///
    /// An encoding failure aborts the call before anything is sent.
    pub async fn broadcast(&self, event: &ChangedEvent) -> Result<usize> {
        let payload = encode_changed_payload(event)?;
        let delivered = self.hub.broadcast(event.project_id(), &payload).await;
        debug!(
            parent: &self.span,
            project_id = %event.project_id(),
            resource_id = %event.resource.resource_id,
            action = %event.action,
            recipients = delivered,
            "Broadcast change"
        );
        Ok(delivered)
    }

    /// Apply `event` to the attached persister, then broadcast it.
    pub async fn publish(&self, event: &ChangedEvent) -> Result<usize> {
        if let Some(persister) = &self.persister {
            match event.action {
                Action::Delete => persister.remove(&event.resource.key()).await?,
                Action::Create | Action::Update => persister.save(event.resource.clone()).await?,
            }
        }
        self.broadcast(event).await
    }

    /// Sweep the hub and report connection counts until `token` or the
    /// operator's shutdown token is cancelled.
    pub async fn run(&self, token: CancellationToken) {
        let config = self.hub.config().clone();
        let now = Instant::now();
        let mut sweep = interval_at(now + config.sweep_interval, config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut report = interval_at(now + config.report_interval, config.report_interval);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(parent: &self.span, "Health sweep started");
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = self.shutdown.cancelled() => break,
                _ = sweep.tick() => {
                    let removed = self.hub.health_sweep();
                    if removed > 0 {
                        info!(parent: &self.span, removed, "Health sweep removed clients");
                    }
                }
                _ = report.tick() => {
                    debug!(
                        parent: &self.span,
                        clients = self.hub.total_count(),
                        projects = self.hub.project_ids().len(),
                        "Connection report"
                    );
                }
            }
        }
        info!(parent: &self.span, "Health sweep stopped");
    }

    pub(crate) fn connected(&self, info: &ConnectionInfo) {
        if let Some(hook) = &self.on_connected {
            hook(info);
        }
    }

    pub(crate) fn disconnected(&self, info: &ConnectionInfo) {
        if let Some(hook) = &self.on_disconnected {
            hook(info);
        }
    }
}

impl Default for SseOperator {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl fmt::Debug for SseOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseOperator")
            .field("endpoint", &self.endpoint)
            .field("hub", &self.hub.stats())
            .field("persister", &self.persister.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Broadcaster for SseOperator {
    async fn broadcast(&self, event: &ChangedEvent) -> Result<usize> {
        SseOperator::broadcast(self, event).await
    }

    async fn run(&self, token: CancellationToken) {
        SseOperator::run(self, token).await
    }
}
