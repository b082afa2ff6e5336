//! Subscriber connection management.

use crate::error::RealtimeError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Unique identifier for a connection.
pub type ConnectionId = String;

/// Receiving half of a connection's outbound queue, drained by the
/// connection's stream loop.
pub type ConnectionReceiver = mpsc::Receiver<String>;

/// One subscriber's live stream.
///
/// Frames are queued in a bounded FIFO; the single stream loop that owns
/// the [`ConnectionReceiver`] writes them out in order. Closing is
/// idempotent and can race freely between the hub and the stream loop.
#[derive(Debug)]
pub struct Connection {
    /// Unique connection identifier.
    pub id: ConnectionId,
    /// Project the connection subscribes to.
    pub project_id: String,
    /// Sending half of the queue. Taken on close.
    sender: Mutex<Option<mpsc::Sender<String>>>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    last_seen: Mutex<Instant>,
    connected_at: Instant,
}

impl Connection {
    /// Create a connection with a fresh id.
    pub fn new(project_id: impl Into<String>, capacity: usize) -> (Arc<Self>, ConnectionReceiver) {
        Self::with_id(uuid::Uuid::new_v4().to_string(), project_id, capacity)
    }

    /// Create a connection with a caller-chosen id.
    pub fn with_id(
        id: impl Into<ConnectionId>,
        project_id: impl Into<String>,
        capacity: usize,
    ) -> (Arc<Self>, ConnectionReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let now = Instant::now();
        let connection = Arc::new(Self {
            id: id.into(),
            project_id: project_id.into(),
            sender: Mutex::new(Some(sender)),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            last_seen: Mutex::new(now),
            connected_at: now,
        });
        (connection, receiver)
    }

    /// Queue a frame, waiting at most `timeout` for room.
    ///
    /// Fails with [`RealtimeError::Closed`] if the connection is closed
    /// before or during the wait, and with [`RealtimeError::Timeout`] if the
    /// queue stays full for the whole window.
    pub async fn send(&self, frame: String, timeout: Duration) -> Result<(), RealtimeError> {
        if !self.is_connected() {
            return Err(RealtimeError::Closed);
        }
        let sender = self.sender.lock().clone().ok_or(RealtimeError::Closed)?;

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(RealtimeError::Closed),
            sent = tokio::time::timeout(timeout, sender.send(frame)) => match sent {
                Ok(Ok(())) => {
                    self.touch();
                    Ok(())
                }
                // The stream loop dropped its receiver.
                Ok(Err(_)) => Err(RealtimeError::Closed),
                Err(_) => Err(RealtimeError::Timeout),
            },
        }
    }

    /// Close the connection.
    ///
    /// Returns `true` for the single call that actually performed the close.
    pub fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.shutdown.cancel();
        self.sender.lock().take();
        true
    }

    /// Non-blocking check of the closed flag.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }

    /// Record activity on the stream.
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Last successful send or keepalive.
    pub fn last_seen(&self) -> Instant {
        *self.last_seen.lock()
    }

    /// When the connection was created.
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }
}
