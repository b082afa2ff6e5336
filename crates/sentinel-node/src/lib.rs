//! # Sentinel Node
//!
//! Library side of the `sentinel` binary.
//!
//! - `sentinel serve` runs an [`SseOperator`](sentinel_operator::SseOperator)
//!   behind axum, checks credentials against the configured api keys and
//!   optionally publishes a demo resource on a timer.
//! - `sentinel listen` runs an [`Agent`](sentinel_agent::Agent) against a
//!   remote stream, mirrors it into a local store and prints every
//!   notification as a JSON line.
//!
//! ## Quick Start
//!
//! ```yaml
//! # sentinel.yaml
//! api_keys:
//!   project-1: [apikey-1]
//! ```
//!
//! ```bash
//! sentinel serve --demo-interval 1
//! sentinel listen --url http://127.0.0.1:8080/events --apikey apikey-1 --project project-1
//! ```
//!
//! Configuration is described in [`config`].

pub mod config;
pub mod listen;
pub mod observability;
pub mod server;

pub use config::NodeConfig;
