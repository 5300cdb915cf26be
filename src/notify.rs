//! Cycle-completion notifications
//!
//! After a cycle in which every source succeeded, one [`CycleNotification`] is published so
//! that downstream pipelines can pick up the new data.

use crate::config::NotificationConfig;
use crate::error::{Error, Result};
use crate::types::CycleNotification;
use async_trait::async_trait;
use std::time::Duration;

/// Destination for cycle notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Publish one notification; `Ok` means the sink acknowledged it
    async fn publish(&self, notification: &CycleNotification) -> Result<()>;
}

/// Publishes notifications as JSON POSTs to an HTTP topic endpoint
#[derive(Clone, Debug)]
pub struct HttpTopicSink {
    client: reqwest::Client,
    url: String,
    auth_header: Option<String>,
    timeout: Duration,
}

impl HttpTopicSink {
    /// Sink for `url` using `client`
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            auth_header: None,
            timeout,
        }
    }

    /// Send `header` as the `Authorization` value
    pub fn with_auth_header(mut self, header: impl Into<String>) -> Self {
        self.auth_header = Some(header.into());
        self
    }

    /// Sink described by `config`, or `None` when no topic is configured
    pub fn from_config(client: reqwest::Client, config: &NotificationConfig) -> Option<Self> {
        let url = config.topic_url.as_ref()?;
        let mut sink = Self::new(client, url.clone(), config.timeout);
        if let Some(auth) = &config.auth_header {
            sink = sink.with_auth_header(auth.clone());
        }
        Some(sink)
    }
}

#[async_trait]
impl NotificationSink for HttpTopicSink {
    async fn publish(&self, notification: &CycleNotification) -> Result<()> {
        let mut request = self
            .client
            .post(&self.url)
            .json(notification)
            .timeout(self.timeout);

        if let Some(auth) = &self.auth_header {
            request = request.header("Authorization", auth);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Notify(format!("failed to reach {}: {e}", self.url)))?;

        if !response.status().is_success() {
            return Err(Error::Notify(format!(
                "{} returned status {}",
                self.url,
                response.status()
            )));
        }

        tracing::info!(url = %self.url, event = %notification.event, "notification published");
        Ok(())
    }
}

/// Sink used when no topic is configured
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn publish(&self, notification: &CycleNotification) -> Result<()> {
        tracing::debug!(event = %notification.event, "no notification topic configured");
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification() -> CycleNotification {
        CycleNotification {
            event: "cycle_complete".to_string(),
            timestamp: 1_700_000_000,
            sources: vec!["maxmind".to_string()],
        }
    }

    #[tokio::test]
    async fn http_sink_posts_json_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/topics/downloader-new-files"))
            .and(header("Authorization", "Bearer token"))
            .and(body_json(notification()))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpTopicSink::new(
            reqwest::Client::new(),
            format!("{}/topics/downloader-new-files", server.uri()),
            Duration::from_secs(5),
        )
        .with_auth_header("Bearer token");

        sink.publish(&notification()).await.unwrap();
    }

    #[tokio::test]
    async fn http_sink_rejects_non_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sink = HttpTopicSink::new(reqwest::Client::new(), server.uri(), Duration::from_secs(5));
        let err = sink.publish(&notification()).await.unwrap_err();
        assert!(matches!(err, Error::Notify(_)));
    }

    #[test]
    fn from_config_requires_topic() {
        let mut config = NotificationConfig::default();
        assert!(HttpTopicSink::from_config(reqwest::Client::new(), &config).is_none());

        config.topic_url = Some("http://localhost/topic".to_string());
        config.auth_header = Some("Bearer x".to_string());
        let sink = HttpTopicSink::from_config(reqwest::Client::new(), &config).unwrap();
        assert_eq!(sink.auth_header.as_deref(), Some("Bearer x"));
    }

    #[tokio::test]
    async fn noop_sink_always_acknowledges() {
        NoopSink.publish(&notification()).await.unwrap();
    }
}
