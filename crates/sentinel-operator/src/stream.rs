//! Per-connection event loop.

use crate::operator::{ConnectionInfo, SseOperator};
use async_stream::stream;
use axum::response::sse::Event;
use futures::Stream;
use sentinel_realtime::{Connection, ConnectionReceiver};
use sentinel_types::wire::connected_payload;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Comment text of an idle-stream keepalive.
const KEEPALIVE_COMMENT: &str = "keepalive";

enum Step {
    Frame(String),
    Keepalive,
    Stop(&'static str),
}

/// Tears a stream down when its body is dropped, whichever way it ended.
struct ConnectionGuard {
    operator: Arc<SseOperator>,
    connection: Arc<Connection>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connection.close();
        self.operator
            .hub
            .remove(&self.connection.project_id, &self.connection.id);
        self.operator.disconnected(&ConnectionInfo {
            id: self.connection.id.clone(),
            project_id: self.connection.project_id.clone(),
        });
    }
}

/// The body of one subscriber's response.
///
/// Emits the handshake, then change payloads from the connection's queue in order,
/// with a keepalive comment after every idle `keepalive_interval`. This is
/// the only writer of the response.
pub(crate) fn event_stream(
    operator: Arc<SseOperator>,
    connection: Arc<Connection>,
    mut receiver: ConnectionReceiver,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    // Built outside the generator so an unpolled body still cleans up.
    let guard = ConnectionGuard {
        operator: operator.clone(),
        connection: connection.clone(),
    };

    stream! {
        let _guard = guard;
        let span = operator.span.clone();
        let shutdown = operator.shutdown.clone();
        let period = operator.hub.config().keepalive_interval;

        yield Ok(Event::default().data(connected_payload(&connection.id)));

        let mut keepalive = interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Step::Stop("server shutting down"),
                _ = connection.closed() => Step::Stop("connection closed"),
                frame = receiver.recv() => match frame {
                    Some(frame) => Step::Frame(frame),
                    None => Step::Stop("queue closed"),
                },
                _ = keepalive.tick() => Step::Keepalive,
            };

            match step {
                Step::Frame(frame) => {
                    keepalive.reset();
                    yield Ok(Event::default().data(frame));
                }
                Step::Keepalive => {
                    yield Ok(Event::default().comment(KEEPALIVE_COMMENT));
                    connection.touch();
                }
                Step::Stop(reason) => {
                    debug!(
                        parent: &span,
                        project_id = %connection.project_id,
                        connection_id = %connection.id,
                        reason,
                        "Stream ended"
                    );
                    break;
                }
            }
        }
    }
}
