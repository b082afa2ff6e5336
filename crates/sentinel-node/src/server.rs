//! The `serve` command: an operator behind an axum listener.

use crate::config::{DemoSettings, NodeConfig};
use anyhow::Context;
use axum::Router;
use chrono::Utc;
use sentinel_operator::SseOperator;
use sentinel_storage::{FilePersister, MemoryPersister, Persister};
use sentinel_types::{Action, ChangedEvent, Resource, ResourceType};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// File persister under `dir`, or an in-memory one.
pub async fn open_persister(dir: Option<&Path>) -> anyhow::Result<Arc<dyn Persister>> {
    match dir {
        Some(dir) => {
            let persister = FilePersister::open(dir)
                .await
                .with_context(|| format!("failed to open data directory {}", dir.display()))?;
            Ok(Arc::new(persister))
        }
        None => Ok(Arc::new(MemoryPersister::new())),
    }
}

/// Build the operator described by `config`.
pub async fn build_operator(config: &NodeConfig) -> anyhow::Result<Arc<SseOperator>> {
    if config.api_keys.is_empty() {
        warn!("No api keys configured, every stream will be rejected");
    }

    let persister = open_persister(config.data_dir.as_deref()).await?;
    let operator = SseOperator::new(config.endpoint.clone())
        .with_hub_config(config.hub.to_hub_config())
        .with_verifier(config.api_keys())
        .with_persister(persister)
        .on_connected(|conn| {
            debug!(connection_id = %conn.id, project_id = %conn.project_id, "Subscriber joined");
        })
        .on_disconnected(|conn| {
            debug!(connection_id = %conn.id, project_id = %conn.project_id, "Subscriber left");
        });
    Ok(Arc::new(operator))
}

/// Operator routes with request tracing.
pub fn router(operator: Arc<SseOperator>) -> Router {
    operator.router().layer(TraceLayer::new_for_http())
}

/// Serve `operator` on `listener` until `shutdown` resolves.
///
/// Shutdown cancels the operator first so that open streams end, then
/// waits for axum to drain.
pub async fn run_server(
    listener: TcpListener,
    operator: Arc<SseOperator>,
    demo: DemoSettings,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let token = operator.shutdown_token();

    let maintenance = {
        let operator = operator.clone();
        let token = token.clone();
        tokio::spawn(async move { operator.run(token).await })
    };
    let publisher = demo.interval().map(|period| {
        tokio::spawn(run_demo(operator.clone(), demo.clone(), period, token.clone()))
    });

    let addr = listener.local_addr()?;
    info!(
        addr = %addr,
        endpoint = %operator.endpoint(),
        demo = publisher.is_some(),
        "Serving resource streams"
    );

    let stop = token.clone();
    axum::serve(listener, router(operator))
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown signal received");
            stop.cancel();
        })
        .await
        .context("server shutdown with error")?;

    token.cancel();
    maintenance.await?;
    if let Some(publisher) = publisher {
        publisher.await?;
    }
    info!("Server stopped");
    Ok(())
}

/// Bind `config.listen` and serve until Ctrl-C.
pub async fn serve(config: NodeConfig) -> anyhow::Result<()> {
    let operator = build_operator(&config).await?;
    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    run_server(listener, operator, config.demo, shutdown_signal()).await
}

/// Publish an update of the demo resource every `period`.
pub async fn run_demo(
    operator: Arc<SseOperator>,
    demo: DemoSettings,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequence: u64 = 0;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        sequence += 1;

        let body = format!("{} #{sequence}", Utc::now().to_rfc3339());
        let resource = Resource::new(
            demo.project.as_str(),
            demo.resource_id.as_str(),
            ResourceType::Text,
            body.into_bytes(),
        );
        match operator
            .publish(&ChangedEvent::new(Action::Update, resource))
            .await
        {
            Ok(delivered) => debug!(sequence, delivered, "Published demo update"),
            Err(err) => warn!(sequence, error = %err, "Failed to publish demo update"),
        }
    }
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
