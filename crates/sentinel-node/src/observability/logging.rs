//! Structured logging initialization.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format (for development).
    Pretty,
    /// JSON format (for log aggregation).
    Json,
}

impl LogFormat {
    /// Parse log format from string. Anything but `json` is pretty.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }

    /// Name used in the startup log line.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

/// Crates whose log level follows `--log-level`.
const CRATES: &[&str] = &[
    "sentinel",
    "sentinel_node",
    "sentinel_storage",
    "sentinel_auth",
    "sentinel_realtime",
    "sentinel_operator",
    "sentinel_agent",
];

/// Default filter when `RUST_LOG` is not set.
fn default_filter(level: &str) -> String {
    let mut directives: Vec<String> = CRATES
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect();
    directives.push("tower_http=debug".to_string());
    directives.push("axum::rejection=trace".to_string());
    directives.join(",")
}

/// Initialize the logging system.
///
/// `RUST_LOG` wins over `level` when set.
///
/// ```rust,no_run
/// use sentinel_node::observability::{init_logging, LogFormat};
///
/// init_logging("info", LogFormat::Json);
/// ```
pub fn init_logging(level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into());

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }

    tracing::info!(level = %level, format = format.as_str(), "Logging initialized");
}
