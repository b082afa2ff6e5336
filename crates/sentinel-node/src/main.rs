//! Sentinel - real-time resource change streams.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sentinel_node::config::NodeConfig;
use sentinel_node::listen::{listen, ListenTarget};
use sentinel_node::observability::{init_logging, LogFormat};
use sentinel_node::server::{serve, shutdown_signal};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Sentinel - stream resource changes to subscribed clients
#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (default: ./sentinel.yaml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve resource change streams
    Serve {
        /// Listen address
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Persist resources under this directory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Publish a demo update every N seconds
        #[arg(long)]
        demo_interval: Option<u64>,
    },

    /// Mirror a project's stream locally and print each update
    Listen {
        /// Stream URL
        #[arg(long)]
        url: String,

        /// API key
        #[arg(long)]
        apikey: String,

        /// Project to subscribe to
        #[arg(long)]
        project: String,

        /// Persist resources under this directory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Consecutive failures before giving up (0 retries forever)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Delay between reconnect attempts in milliseconds
        #[arg(long)]
        retry_delay_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        NodeConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }

    init_logging(&config.log_level, LogFormat::parse(&config.log_format));
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting sentinel");

    match cli.command {
        Commands::Serve {
            listen,
            data_dir,
            demo_interval,
        } => {
            if let Some(listen) = listen {
                config.listen = listen;
            }
            if data_dir.is_some() {
                config.data_dir = data_dir;
            }
            if let Some(secs) = demo_interval {
                config.demo.interval_secs = secs;
            }
            tracing::info!(
                listen = %config.listen,
                endpoint = %config.endpoint,
                data_dir = ?config.data_dir,
                projects = config.api_keys.len(),
                "Server configuration"
            );
            serve(config).await
        }
        Commands::Listen {
            url,
            apikey,
            project,
            data_dir,
            max_retries,
            retry_delay_ms,
        } => {
            if data_dir.is_some() {
                config.data_dir = data_dir;
            }
            if let Some(max_retries) = max_retries {
                config.subscriber.max_retries = max_retries;
            }
            if let Some(delay) = retry_delay_ms {
                config.subscriber.retry_delay_ms = delay;
            }
            let target = ListenTarget {
                url,
                apikey,
                project,
            };
            listen(&config, target, tokio::io::stdout(), shutdown_signal()).await
        }
    }
}
