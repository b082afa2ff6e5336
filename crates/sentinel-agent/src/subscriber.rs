//! Reconnecting stream subscriber.

use crate::config::SubscriberConfig;
use crate::decoder::{FrameParser, RawEvent};
use crate::error::{AgentError, Result};
use crate::handler::{ResourceUpdate, UpdateHandler};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{StatusCode, Url};
use sentinel_types::wire::{decode_payload, Payload};
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Span};

/// Client transport capability: keep a stream open and feed its updates to
/// a handler.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Stream until cancelled, the stream ends or the retry budget runs out.
    async fn connect(&self, handler: &dyn UpdateHandler, token: CancellationToken) -> Result<()>;
}

/// How a successful attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    /// The server finished the response.
    Closed,
    /// The caller cancelled.
    Cancelled,
}

/// Server-sent event subscriber with fixed-delay reconnects.
#[derive(Debug, Clone)]
pub struct SseSubscriber {
    config: SubscriberConfig,
    url: Url,
    http: reqwest::Client,
    span: Span,
}

impl SseSubscriber {
    /// Create a subscriber. Fails if the endpoint is not a valid URL.
    pub fn new(config: SubscriberConfig) -> Result<Self> {
        let mut url = Url::parse(&config.endpoint)
            .map_err(|e| AgentError::InvalidEndpoint(format!("{}: {e}", config.endpoint)))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(apikey) = &config.apikey {
                query.append_pair("apikey", apikey);
            }
            if let Some(project) = &config.project {
                query.append_pair("project", project);
            }
        }
        // An empty pair list still leaves a bare `?`.
        if url.query() == Some("") {
            url.set_query(None);
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        let span = info_span!("sse_subscriber", endpoint = %config.endpoint);

        Ok(Self {
            config,
            url,
            http,
            span,
        })
    }

    /// Emit every log line under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Subscriber settings.
    pub fn config(&self) -> &SubscriberConfig {
        &self.config
    }

    /// Full stream URL including credentials.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Stream until cancelled, the stream ends or the retry budget runs out.
    ///
    /// A clean end of stream returns `Ok` unless `resume_on_close` is set.
    /// Cancellation, including during the retry delay, returns `Ok`.
    pub async fn connect(&self, handler: &dyn UpdateHandler, token: CancellationToken) -> Result<()> {
        let max_retries = self.config.max_retries;
        let mut failures: u32 = 0;
        let mut first = true;

        loop {
            if !first {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!(parent: &self.span, "Cancelled while waiting to reconnect");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(self.config.retry_delay) => {}
                }
            }
            first = false;

            match self.stream_once(handler, &token).await {
                Ok(StreamEnd::Cancelled) => {
                    info!(parent: &self.span, "Subscription cancelled");
                    return Ok(());
                }
                Ok(StreamEnd::Closed) if self.config.resume_on_close => {
                    info!(parent: &self.span, "Stream closed by server, reconnecting");
                    failures = 0;
                }
                Ok(StreamEnd::Closed) => {
                    info!(parent: &self.span, "Stream closed by server");
                    return Ok(());
                }
                Err(err) => {
                    failures += 1;
                    if max_retries != 0 && failures > max_retries {
                        warn!(
                            parent: &self.span,
                            attempts = failures,
                            error = %err,
                            "Retry exhausted"
                        );
                        return Err(AgentError::RetriesExhausted {
                            attempts: failures,
                            source: Box::new(err),
                        });
                    }
                    warn!(
                        parent: &self.span,
                        attempt = failures,
                        max_retries,
                        delay_ms = self.config.retry_delay.as_millis() as u64,
                        error = %err,
                        "Connection attempt failed, retrying"
                    );
                }
            }
        }
    }

    async fn stream_once(
        &self,
        handler: &dyn UpdateHandler,
        token: &CancellationToken,
    ) -> Result<StreamEnd> {
        let request = self
            .http
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        let response = tokio::select! {
            _ = token.cancelled() => return Ok(StreamEnd::Cancelled),
            response = request.send() => response?,
        };
        if response.status() != StatusCode::OK {
            return Err(AgentError::UnexpectedStatus(response.status().as_u16()));
        }
        info!(parent: &self.span, "Connected to stream");

        let body = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
        let mut reader = StreamReader::new(body);
        let mut parser = FrameParser::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(StreamEnd::Cancelled),
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => return Ok(StreamEnd::Closed),
                Ok(_) => {
                    // Invalid UTF-8 only spoils the event it belongs to.
                    let event = {
                        let line = String::from_utf8_lossy(&buf);
                        parser.push_line(line.strip_suffix('\n').unwrap_or(&line))
                    };
                    if let Some(event) = event {
                        self.dispatch(event, handler).await;
                    }
                }
                Err(err) => return Err(AgentError::Stream(err)),
            }
        }
    }

    async fn dispatch(&self, event: RawEvent, handler: &dyn UpdateHandler) {
        let update = match decode_payload(&event.event_type, &event.data) {
            Ok(Payload::Connected { id }) => {
                debug!(parent: &self.span, connection_id = %id, "Stream handshake");
                return;
            }
            Ok(Payload::Changed(changed)) => ResourceUpdate {
                action: Some(changed.action),
                resource: changed.resource,
            },
            Ok(Payload::Resource(resource)) => ResourceUpdate {
                action: None,
                resource,
            },
            Err(err) => {
                warn!(
                    parent: &self.span,
                    event_type = %event.event_type,
                    error = %err,
                    "Failed to decode event, skipping"
                );
                return;
            }
        };
        handler.handle(update).await;
    }
}

#[async_trait]
impl Subscriber for SseSubscriber {
    async fn connect(&self, handler: &dyn UpdateHandler, token: CancellationToken) -> Result<()> {
        SseSubscriber::connect(self, handler, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_carries_credentials() {
        let config = SubscriberConfig::new("http://localhost:8080/events")
            .with_credentials("key 1", "proj-1");
        let subscriber = SseSubscriber::new(config).unwrap();
        assert_eq!(
            subscriber.url().as_str(),
            "http://localhost:8080/events?apikey=key+1&project=proj-1"
        );
    }

    #[test]
    fn test_url_without_credentials() {
        let subscriber =
            SseSubscriber::new(SubscriberConfig::new("http://localhost:8080/events")).unwrap();
        assert_eq!(subscriber.url().as_str(), "http://localhost:8080/events");
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            SseSubscriber::new(SubscriberConfig::new("not a url")),
            Err(AgentError::InvalidEndpoint(_))
        ));
    }
}
