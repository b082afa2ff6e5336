//! Subscriber and agent settings.

use std::time::Duration;

/// Connection settings of an [`SseSubscriber`](crate::SseSubscriber).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberConfig {
    /// Stream URL, e.g. `http://127.0.0.1:8080/events`.
    pub endpoint: String,
    /// Sent as the `apikey` query parameter.
    pub apikey: Option<String>,
    /// Sent as the `project` query parameter.
    pub project: Option<String>,
    /// Retries after a failed attempt. `0` retries forever.
    pub max_retries: u32,
    /// Fixed delay before every attempt but the first.
    pub retry_delay: Duration,
    /// Reconnect when the server ends the stream cleanly.
    pub resume_on_close: bool,
    /// TCP connect timeout of each attempt.
    pub connect_timeout: Duration,
}

impl SubscriberConfig {
    /// Settings for `endpoint` with default retry behaviour.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            apikey: None,
            project: None,
            max_retries: 0,
            retry_delay: Duration::from_secs(5),
            resume_on_close: false,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Authenticate as `apikey` on `project`.
    pub fn with_credentials(mut self, apikey: impl Into<String>, project: impl Into<String>) -> Self {
        self.apikey = Some(apikey.into());
        self.project = Some(project.into());
        self
    }

    /// Give up after `max_retries` retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Wait `delay` between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Reconnect after a clean end of stream.
    pub fn with_resume_on_close(mut self, resume: bool) -> Self {
        self.resume_on_close = resume;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Delivery settings of an [`Agent`](crate::Agent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Capacity of the notification queue.
    pub notify_capacity: usize,
    /// Save attempts per update before it is dropped.
    pub persist_attempts: u32,
    /// Delay between save attempts.
    pub persist_retry_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            notify_capacity: 1,
            persist_attempts: 3,
            persist_retry_delay: Duration::from_millis(100),
        }
    }
}

impl AgentConfig {
    /// Set the notification queue capacity (at least 1).
    pub fn with_notify_capacity(mut self, capacity: usize) -> Self {
        self.notify_capacity = capacity.max(1);
        self
    }

    /// Set the save retry policy. At least one attempt is always made.
    pub fn with_persist_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.persist_attempts = attempts.max(1);
        self.persist_retry_delay = delay;
        self
    }
}
