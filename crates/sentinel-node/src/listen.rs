//! The `listen` command: mirror a project's stream into a local store.

use crate::config::NodeConfig;
use crate::server::open_persister;
use anyhow::Context;
use sentinel_agent::{Agent, ResourceUpdate, SnapshotClient, SseSubscriber};
use std::future::Future;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Stream to subscribe to.
#[derive(Debug, Clone)]
pub struct ListenTarget {
    /// Full stream URL, e.g. `http://localhost:8080/events`.
    pub url: String,
    /// Key sent as the `apikey` query parameter.
    pub apikey: String,
    /// Project whose changes are mirrored.
    pub project: String,
}

/// Run an agent against `target` until `shutdown` resolves or the
/// subscriber gives up. Each notification is written to `out` as one JSON
/// line.
pub async fn listen<W>(
    config: &NodeConfig,
    target: ListenTarget,
    out: W,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let persister = open_persister(config.data_dir.as_deref()).await?;
    let (agent, updates) = Agent::new(persister, config.agent.to_agent_config());
    let snapshot = SnapshotClient::new(&target.url, &target.apikey, &target.project)
        .context("invalid stream url")?;
    let agent = agent.with_snapshot(snapshot);

    let subscriber = SseSubscriber::new(config.subscriber.to_subscriber_config(
        target.url.as_str(),
        target.apikey.as_str(),
        target.project.as_str(),
    ))
    .context("invalid stream url")?;

    let token = CancellationToken::new();
    let stop = token.clone();
    tokio::spawn(async move {
        shutdown.await;
        stop.cancel();
    });

    let printer = tokio::spawn(print_updates(updates, out));

    info!(url = %target.url, project = %target.project, "Listening for updates");
    let result = agent.run(&subscriber, token).await;

    let stats = agent.stats();
    info!(
        delivered = stats.delivered,
        persisted = stats.persisted,
        persist_failures = stats.persist_failures,
        notifications_dropped = stats.notifications_dropped,
        "Listener stopped"
    );

    // Closes the notification queue so the printer drains and exits.
    drop(agent);
    printer.await?;

    result.context("subscription failed")
}

async fn print_updates<W>(mut updates: mpsc::Receiver<ResourceUpdate>, mut out: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(update) = updates.recv().await {
        let mut line = match serde_json::to_vec(&update) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "Failed to encode update");
                continue;
            }
        };
        line.push(b'\n');
        let written = async {
            out.write_all(&line).await?;
            out.flush().await
        };
        if let Err(err) = written.await {
            warn!(error = %err, "Failed to write update");
            break;
        }
    }
}
