//! Project-scoped registry of live connections and broadcasting.

use crate::config::HubConfig;
use crate::connection::{Connection, ConnectionId, ConnectionReceiver};
use crate::error::RealtimeError;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Span};

type ProjectConnections = HashMap<ConnectionId, Arc<Connection>>;

/// Registry of live connections grouped by project.
///
/// No lock is held while a broadcast waits on a slow subscriber, so
/// registration, removal and broadcasts to other projects proceed
/// independently.
#[derive(Debug)]
pub struct Hub {
    clients: RwLock<HashMap<String, ProjectConnections>>,
    config: HubConfig,
    span: Span,
    total_connections: AtomicU64,
    total_broadcasts: AtomicU64,
    total_evictions: AtomicU64,
}

impl Hub {
    /// Create a hub with default settings.
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with the given settings.
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            config,
            span: info_span!("hub"),
            total_connections: AtomicU64::new(0),
            total_broadcasts: AtomicU64::new(0),
            total_evictions: AtomicU64::new(0),
        }
    }

    /// Replace the span all hub logs are emitted under (default `hub`).
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Hub settings.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Create and register a connection for `project_id`.
    pub fn connect(&self, project_id: &str) -> (Arc<Connection>, ConnectionReceiver) {
        let (connection, receiver) = Connection::new(project_id, self.config.queue_capacity);
        self.add(connection.clone());
        (connection, receiver)
    }

    /// Register a connection under its project.
    pub fn add(&self, connection: Arc<Connection>) {
        let project_id = connection.project_id.clone();
        let connection_id = connection.id.clone();

        let count = {
            let mut clients = self.clients.write();
            let project = clients.entry(project_id.clone()).or_default();
            project.insert(connection_id.clone(), connection);
            project.len()
        };
        self.total_connections.fetch_add(1, Ordering::Relaxed);

        info!(
            parent: &self.span,
            project_id = %project_id,
            connection_id = %connection_id,
            project_connections = count,
            "Client connected"
        );
    }

    /// Close and unregister a connection.
    ///
    /// Returns `false` if the connection was not registered. The project
    /// entry is dropped once its last connection is gone.
    pub fn remove(&self, project_id: &str, connection_id: &str) -> bool {
        let removed = {
            let mut clients = self.clients.write();
            let Some(project) = clients.get_mut(project_id) else {
                return false;
            };
            let removed = project.remove(connection_id);
            if project.is_empty() {
                clients.remove(project_id);
            }
            removed
        };

        match removed {
            Some(connection) => {
                connection.close();
                info!(
                    parent: &self.span,
                    project_id = %project_id,
                    connection_id = %connection_id,
                    "Client disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Queue `frame` on every connection of `project_id`.
    ///
    /// Sends run concurrently, each bounded by the configured send timeout.
    /// Connections that time out or are closed are evicted. Returns the
    /// number of connections that accepted the frame.
    pub async fn broadcast(&self, project_id: &str, frame: &str) -> usize {
        let targets: Vec<Arc<Connection>> = match self.clients.read().get(project_id) {
            Some(project) => project.values().cloned().collect(),
            None => Vec::new(),
        };
        self.total_broadcasts.fetch_add(1, Ordering::Relaxed);

        if targets.is_empty() {
            debug!(parent: &self.span, project_id = %project_id, "No clients for project");
            return 0;
        }

        let timeout = self.config.send_timeout;
        let results = join_all(targets.iter().map(|connection| {
            let frame = frame.to_string();
            async move { connection.send(frame, timeout).await }
        }))
        .await;

        let mut delivered = 0;
        for (connection, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(err) => self.evict(connection, err),
            }
        }

        debug!(
            parent: &self.span,
            project_id = %project_id,
            recipients = delivered,
            targets = targets.len(),
            "Event broadcast"
        );
        delivered
    }

    fn evict(&self, connection: &Connection, err: RealtimeError) {
        warn!(
            parent: &self.span,
            project_id = %connection.project_id,
            connection_id = %connection.id,
            error = %err,
            "Send failed, removing client"
        );
        self.total_evictions.fetch_add(1, Ordering::Relaxed);
        self.remove(&connection.project_id, &connection.id);
        connection.close();
    }

    /// Remove closed connections and connections idle longer than the
    /// staleness threshold. Returns the number removed.
    pub fn health_sweep(&self) -> usize {
        let stale_after = self.config.stale_after;
        let doomed: Vec<(Arc<Connection>, &'static str)> = self
            .clients
            .read()
            .values()
            .flat_map(|project| project.values())
            .filter_map(|connection| {
                if !connection.is_connected() {
                    Some((connection.clone(), "disconnected"))
                } else if connection.last_seen().elapsed() > stale_after {
                    Some((connection.clone(), "stale"))
                } else {
                    None
                }
            })
            .collect();

        for (connection, reason) in &doomed {
            info!(
                parent: &self.span,
                project_id = %connection.project_id,
                connection_id = %connection.id,
                reason = reason,
                "Removing client during health sweep"
            );
            self.remove(&connection.project_id, &connection.id);
        }
        doomed.len()
    }

    /// Connections registered for `project_id`.
    pub fn count(&self, project_id: &str) -> usize {
        self.clients.read().get(project_id).map_or(0, |p| p.len())
    }

    /// Connections registered across all projects.
    pub fn total_count(&self) -> usize {
        self.clients.read().values().map(|p| p.len()).sum()
    }

    /// Projects with at least one connection.
    pub fn project_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clients.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of hub statistics.
    pub fn stats(&self) -> HubStats {
        let (projects, current_connections) = {
            let clients = self.clients.read();
            (clients.len(), clients.values().map(|p| p.len()).sum())
        };
        HubStats {
            current_connections,
            projects,
            total_connections: self.total_connections.load(Ordering::Relaxed),
            total_broadcasts: self.total_broadcasts.load(Ordering::Relaxed),
            total_evictions: self.total_evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

/// Hub statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubStats {
    /// Current number of connections.
    pub current_connections: usize,
    /// Projects with at least one connection.
    pub projects: usize,
    /// Total connections since start.
    pub total_connections: u64,
    /// Total broadcasts since start.
    pub total_broadcasts: u64,
    /// Connections evicted after a failed send.
    pub total_evictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn hub() -> Arc<Hub> {
        Arc::new(Hub::new())
    }

    #[test]
    fn test_default_span_is_named() {
        let hub = tracing::subscriber::with_default(tracing_subscriber::registry(), Hub::new);
        assert_eq!(hub.span.metadata().map(|m| m.name()), Some("hub"));
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let hub = hub();
        let (c1, _rx1) = hub.connect("p1");
        let (_c2, _rx2) = hub.connect("p1");
        let (_c3, _rx3) = hub.connect("p2");

        assert_eq!(hub.count("p1"), 2);
        assert_eq!(hub.count("p2"), 1);
        assert_eq!(hub.total_count(), 3);
        assert_eq!(hub.project_ids(), vec!["p1".to_string(), "p2".to_string()]);

        assert!(hub.remove("p1", &c1.id));
        assert!(!c1.is_connected());
        assert_eq!(hub.count("p1"), 1);
        assert!(!hub.remove("p1", &c1.id));
        assert!(!hub.remove("missing", "nope"));
    }

    #[tokio::test]
    async fn test_empty_project_is_dropped() {
        let hub = hub();
        let (c1, _rx) = hub.connect("p1");
        hub.remove("p1", &c1.id);

        assert!(hub.project_ids().is_empty());
        assert_eq!(hub.count("p1"), 0);
        assert_eq!(hub.stats().projects, 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_only_project() {
        let hub = hub();
        let (_a, mut rx_a) = hub.connect("p1");
        let (_b, mut rx_b) = hub.connect("p1");
        let (_c, mut rx_c) = hub.connect("p2");

        assert_eq!(hub.broadcast("p1", "data: hello").await, 2);

        assert_eq!(rx_a.recv().await.unwrap(), "data: hello");
        assert_eq!(rx_b.recv().await.unwrap(), "data: hello");
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_to_unknown_project() {
        let hub = hub();
        assert_eq!(hub.broadcast("ghost", "data: x").await, 0);
        assert_eq!(hub.stats().total_broadcasts, 1);
    }

    #[tokio::test]
    async fn test_broadcast_preserves_order() {
        let hub = hub();
        let (_c, mut rx) = hub.connect("p1");

        for i in 0..20 {
            hub.broadcast("p1", &format!("data: {i}")).await;
        }
        for i in 0..20 {
            assert_eq!(rx.recv().await.unwrap(), format!("data: {i}"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_client_is_evicted_without_blocking_others() {
        let config = HubConfig::default().with_queue_capacity(2);
        let hub = Arc::new(Hub::with_config(config));

        let (slow, _slow_rx) = hub.connect("p1");
        let (fast, mut fast_rx) = hub.connect("p1");

        let reader = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(frame) = fast_rx.recv().await {
                seen.push(frame);
                if seen.len() == 3 {
                    break;
                }
            }
            seen
        });

        // Fill the slow queue, then overflow it.
        assert_eq!(hub.broadcast("p1", "data: 1").await, 2);
        assert_eq!(hub.broadcast("p1", "data: 2").await, 2);
        assert_eq!(hub.broadcast("p1", "data: 3").await, 1);

        assert!(!slow.is_connected());
        assert!(fast.is_connected());
        assert_eq!(hub.count("p1"), 1);
        assert_eq!(hub.stats().total_evictions, 1);

        let seen = reader.await.unwrap();
        assert_eq!(seen, vec!["data: 1", "data: 2", "data: 3"]);
    }

    #[tokio::test]
    async fn test_closed_client_is_evicted_on_broadcast() {
        let hub = hub();
        let (c1, _rx1) = hub.connect("p1");
        let (_c2, mut rx2) = hub.connect("p1");

        c1.close();
        assert_eq!(hub.broadcast("p1", "data: x").await, 1);
        assert_eq!(hub.count("p1"), 1);
        assert_eq!(rx2.recv().await.unwrap(), "data: x");
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_sweep() {
        let config = HubConfig::default().with_stale_after(Duration::from_secs(60));
        let hub = Arc::new(Hub::with_config(config));

        let (closed, _rx1) = hub.connect("p1");
        let (idle, _rx2) = hub.connect("p1");
        let (active, _rx3) = hub.connect("p2");
        closed.close();

        assert_eq!(hub.health_sweep(), 1);
        assert_eq!(hub.total_count(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        active.touch();

        assert_eq!(hub.health_sweep(), 1);
        assert!(!idle.is_connected());
        assert_eq!(hub.project_ids(), vec!["p2".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_remove_and_close() {
        let hub = hub();
        let (conn, mut rx) = hub.connect("p1");

        let mut handles = Vec::new();
        for i in 0..16 {
            let hub = hub.clone();
            let conn = conn.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    hub.remove("p1", &conn.id)
                } else {
                    conn.close()
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(hub.total_count(), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let hub = hub();
        let (c1, _rx1) = hub.connect("p1");
        let (_c2, _rx2) = hub.connect("p2");
        hub.remove("p1", &c1.id);
        hub.broadcast("p2", "data: x").await;

        let stats = hub.stats();
        assert_eq!(stats.current_connections, 1);
        assert_eq!(stats.projects, 1);
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.total_broadcasts, 1);
    }
}
