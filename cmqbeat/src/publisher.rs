//! Downstream event pipeline
//!
//! The poller hands every received message to an [`EventPublisher`] before
//! deleting it from the queue. A publisher that returns an error keeps the
//! message in the queue for redelivery.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::types::OutputConfig;

/// Default request timeout for the HTTP pipeline in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// An event built from one queue message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// When the message was received
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Event payload
    pub fields: EventFields,
}

/// Fields carried by an [`Event`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventFields {
    /// Name of the beat that produced the event
    #[serde(rename = "type")]
    pub kind: String,
    /// Position of the message since process start, starting at 1
    pub counter: u64,
    /// Queue message body, untouched
    pub message: String,
}

impl Event {
    /// Creates an event stamped with the current time
    #[must_use]
    pub fn new(kind: &str, counter: u64, message: String) -> Self {
        Self {
            timestamp: Utc::now(),
            fields: EventFields {
                kind: kind.to_string(),
                counter,
                message,
            },
        }
    }
}

/// Sink for events
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one event
    ///
    /// # Errors
    ///
    /// Returns an error if the event was not accepted downstream
    async fn publish(&self, event: Event) -> anyhow::Result<()>;
}

/// Writes each event as one JSON line on stdout
pub struct StdoutPublisher;

#[async_trait::async_trait]
impl EventPublisher for StdoutPublisher {
    async fn publish(&self, event: Event) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(&event).context("Failed to serialize event")?;
        line.push(b'\n');

        let mut stdout = tokio::io::stdout();
        stdout.write_all(&line).await?;
        stdout.flush().await?;

        Ok(())
    }
}

/// Posts each event as JSON to an HTTP endpoint
pub struct HttpPublisher {
    url: String,
    http_client: Client,
}

impl HttpPublisher {
    /// Creates a publisher posting to `url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(url: String) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { url, http_client })
    }
}

#[async_trait::async_trait]
impl EventPublisher for HttpPublisher {
    async fn publish(&self, event: Event) -> anyhow::Result<()> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&event)
            .send()
            .await
            .context("Failed to send event")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Event pipeline rejected event with status {status}");
        }

        debug!(counter = event.fields.counter, %status, "Event accepted by pipeline");
        Ok(())
    }
}

/// Builds the publisher selected by the output configuration
///
/// # Errors
///
/// Returns an error if the publisher cannot be created
pub fn from_config(output: &OutputConfig) -> anyhow::Result<Arc<dyn EventPublisher>> {
    let publisher: Arc<dyn EventPublisher> = match output {
        OutputConfig::Stdout => Arc::new(StdoutPublisher),
        OutputConfig::Http { url } => Arc::new(HttpPublisher::new(url.clone())?),
    };

    Ok(publisher)
}
