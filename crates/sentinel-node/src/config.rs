//! Node configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! `SENTINEL__*` environment variables (`SENTINEL__HUB__QUEUE_CAPACITY=50`).
//! Command line flags are applied on top by the binary. Durations are
//! plain integers in seconds or milliseconds, as the field name says.

use config::{ConfigError, Environment, File};
use sentinel_agent::{AgentConfig, SubscriberConfig};
use sentinel_auth::StaticApiKeys;
use sentinel_realtime::HubConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "sentinel";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "SENTINEL";

/// Configuration for the sentinel binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address the server listens on.
    pub listen: SocketAddr,
    /// Stream route; the snapshot and stats routes hang below it.
    pub endpoint: String,
    /// Directory of the file persister. Memory only when unset.
    pub data_dir: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format (pretty or json).
    pub log_format: String,
    /// Accepted api keys per project.
    pub api_keys: HashMap<String, Vec<String>>,
    /// Demo publisher.
    pub demo: DemoSettings,
    /// Connection registry and stream loop tuning.
    pub hub: HubSettings,
    /// Client reconnect behaviour.
    pub subscriber: SubscriberSettings,
    /// Local delivery tuning.
    pub agent: AgentSettings,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            endpoint: sentinel_operator::DEFAULT_ENDPOINT.to_string(),
            data_dir: None,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            api_keys: HashMap::new(),
            demo: DemoSettings::default(),
            hub: HubSettings::default(),
            subscriber: SubscriberSettings::default(),
            agent: AgentSettings::default(),
        }
    }
}

impl NodeConfig {
    /// Load defaults, then `path` (or `sentinel.yaml` if present), then the
    /// environment.
    ///
    /// An explicit `path` must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(path, environment())
    }

    fn from_sources(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: Self = config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("hub.keepalive_interval_secs", self.hub.keepalive_interval_secs),
            ("hub.sweep_interval_secs", self.hub.sweep_interval_secs),
            ("hub.report_interval_secs", self.hub.report_interval_secs),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(ConfigError::Message(format!("{name} must be positive")));
            }
        }
        if self.hub.queue_capacity == 0 {
            return Err(ConfigError::Message(
                "hub.queue_capacity must be positive".to_string(),
            ));
        }
        if self.agent.notify_capacity == 0 {
            return Err(ConfigError::Message(
                "agent.notify_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Credential table built from `api_keys`.
    pub fn api_keys(&self) -> StaticApiKeys {
        self.api_keys
            .iter()
            .flat_map(|(project, keys)| keys.iter().map(move |key| (project.clone(), key.clone())))
            .collect()
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Periodic demo publisher of the `serve` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// Seconds between demo updates. Zero disables the publisher.
    pub interval_secs: u64,
    /// Project the demo resource belongs to.
    pub project: String,
    /// Id of the demo resource.
    pub resource_id: String,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            interval_secs: 0,
            project: "project-1".to_string(),
            resource_id: "resource-1".to_string(),
        }
    }
}

impl DemoSettings {
    /// Publish period, `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

/// Hub settings as they appear in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    pub queue_capacity: usize,
    pub send_timeout_secs: u64,
    pub keepalive_interval_secs: u64,
    pub sweep_interval_secs: u64,
    pub stale_after_secs: u64,
    pub report_interval_secs: u64,
}

impl Default for HubSettings {
    fn default() -> Self {
        let hub = HubConfig::default();
        Self {
            queue_capacity: hub.queue_capacity,
            send_timeout_secs: hub.send_timeout.as_secs(),
            keepalive_interval_secs: hub.keepalive_interval.as_secs(),
            sweep_interval_secs: hub.sweep_interval.as_secs(),
            stale_after_secs: hub.stale_after.as_secs(),
            report_interval_secs: hub.report_interval.as_secs(),
        }
    }
}

impl HubSettings {
    pub fn to_hub_config(&self) -> HubConfig {
        HubConfig::default()
            .with_queue_capacity(self.queue_capacity)
            .with_send_timeout(Duration::from_secs(self.send_timeout_secs))
            .with_keepalive_interval(Duration::from_secs(self.keepalive_interval_secs))
            .with_sweep_interval(Duration::from_secs(self.sweep_interval_secs))
            .with_stale_after(Duration::from_secs(self.stale_after_secs))
            .with_report_interval(Duration::from_secs(self.report_interval_secs))
    }
}

/// Reconnect settings of the `listen` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberSettings {
    /// Consecutive failures tolerated; 0 retries forever.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Reconnect when the server ends the stream cleanly.
    pub resume_on_close: bool,
    pub connect_timeout_secs: u64,
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        let subscriber = SubscriberConfig::new("");
        Self {
            max_retries: subscriber.max_retries,
            retry_delay_ms: subscriber.retry_delay.as_millis() as u64,
            resume_on_close: subscriber.resume_on_close,
            connect_timeout_secs: subscriber.connect_timeout.as_secs(),
        }
    }
}

impl SubscriberSettings {
    pub fn to_subscriber_config(
        &self,
        endpoint: impl Into<String>,
        apikey: impl Into<String>,
        project: impl Into<String>,
    ) -> SubscriberConfig {
        SubscriberConfig::new(endpoint)
            .with_credentials(apikey, project)
            .with_max_retries(self.max_retries)
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
            .with_resume_on_close(self.resume_on_close)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
    }
}

/// Local delivery settings of the `listen` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub notify_capacity: usize,
    pub persist_attempts: u32,
    pub persist_retry_delay_ms: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        let agent = AgentConfig::default();
        Self {
            notify_capacity: agent.notify_capacity,
            persist_attempts: agent.persist_attempts,
            persist_retry_delay_ms: agent.persist_retry_delay.as_millis() as u64,
        }
    }
}

impl AgentSettings {
    pub fn to_agent_config(&self) -> AgentConfig {
        AgentConfig::default()
            .with_notify_capacity(self.notify_capacity)
            .with_persist_retry(
                self.persist_attempts,
                Duration::from_millis(self.persist_retry_delay_ms),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_auth::CredentialVerifier;

    fn no_env() -> Environment {
        environment().source(Some(config::Map::new()))
    }

    fn env(vars: &[(&str, &str)]) -> Environment {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(vars))
    }

    fn write_yaml(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentinel.yaml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_defaults_match_library_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.hub.to_hub_config(), HubConfig::default());
        assert_eq!(config.agent.to_agent_config(), AgentConfig::default());
        assert_eq!(config.subscriber.max_retries, 0);
        assert_eq!(config.subscriber.retry_delay_ms, 5000);
        assert_eq!(config.endpoint, "/events");
        assert!(config.demo.interval().is_none());
    }

    #[test]
    fn test_load_yaml_file() {
        let (_dir, path) = write_yaml(
            r#"
listen: "0.0.0.0:9000"
endpoint: /sse
data_dir: /var/lib/sentinel
api_keys:
  project-1: [key-a, key-b]
demo:
  interval_secs: 1
hub:
  queue_capacity: 10
  keepalive_interval_secs: 15
subscriber:
  max_retries: 4
  retry_delay_ms: 250
"#,
        );

        let config = NodeConfig::from_sources(Some(&path), no_env()).unwrap();

        assert_eq!(config.listen, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.endpoint, "/sse");
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/sentinel")));
        assert_eq!(config.api_keys["project-1"], vec!["key-a", "key-b"]);
        assert_eq!(config.demo.interval(), Some(Duration::from_secs(1)));

        let hub = config.hub.to_hub_config();
        assert_eq!(hub.queue_capacity, 10);
        assert_eq!(hub.keepalive_interval, Duration::from_secs(15));
        assert_eq!(hub.send_timeout, Duration::from_secs(5));

        let subscriber = config
            .subscriber
            .to_subscriber_config("http://localhost:9000/sse", "key-a", "project-1");
        assert_eq!(subscriber.max_retries, 4);
        assert_eq!(subscriber.retry_delay, Duration::from_millis(250));
        assert_eq!(subscriber.apikey.as_deref(), Some("key-a"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let (_dir, path) = write_yaml("hub:\n  queue_capacity: 10\nlog_level: info\n");
        let vars = env(&[
            ("SENTINEL__HUB__QUEUE_CAPACITY", "42"),
            ("SENTINEL__LOG_LEVEL", "debug"),
            ("SENTINEL__SUBSCRIBER__RESUME_ON_CLOSE", "true"),
        ]);

        let config = NodeConfig::from_sources(Some(&path), vars).unwrap();

        assert_eq!(config.hub.queue_capacity, 42);
        assert_eq!(config.log_level, "debug");
        assert!(config.subscriber.resume_on_close);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(NodeConfig::from_sources(Some(&path), no_env()).is_err());
    }

    #[test]
    fn test_zero_period_rejected() {
        let (_dir, path) = write_yaml("hub:\n  sweep_interval_secs: 0\n");
        let err = NodeConfig::from_sources(Some(&path), no_env()).unwrap_err();
        assert!(err.to_string().contains("hub.sweep_interval_secs"));
    }

    #[tokio::test]
    async fn test_api_keys_table() {
        let mut config = NodeConfig::default();
        config
            .api_keys
            .insert("p1".to_string(), vec!["k1".to_string(), "k2".to_string()]);

        let keys = config.api_keys();
        assert!(keys.verify("k1", "p1").await.is_ok());
        assert!(keys.verify("k2", "p1").await.is_ok());
        assert!(keys.verify("k1", "p2").await.is_err());
    }
}
