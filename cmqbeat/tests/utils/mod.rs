#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use cmq_client::{Credentials, QueueConfig};
use cmqbeat::publisher::{Event, EventPublisher};
use tokio::net::TcpListener;

pub const SECRET_KEY: &str = "beat-test-key";

/// Initialize tracing for tests
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn queue_config(url: String) -> QueueConfig {
    QueueConfig {
        queue_name: "beat-queue".to_string(),
        region: "gz".to_string(),
        url,
        credentials: Credentials {
            secret_id: "AKIDbeat".to_string(),
            secret_key: SECRET_KEY.to_string(),
        },
        polling_wait_seconds: 0,
        request_timeout: Some(Duration::from_secs(2)),
    }
}

/// Publisher keeping every event in memory
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<Event>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: Event) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Polls `condition` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Local HTTP endpoint standing in for a downstream event pipeline
pub struct PipelineServer {
    pub url: String,
    pub received: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl PipelineServer {
    /// Starts a pipeline answering every POST with `status`
    pub async fn start(status: StatusCode) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/events",
                post(
                    |State((received, status)): State<(Arc<Mutex<Vec<serde_json::Value>>>, StatusCode)>,
                     Json(body): Json<serde_json::Value>| async move {
                        received.lock().unwrap().push(body);
                        status
                    },
                ),
            )
            .with_state((Arc::clone(&received), status));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind pipeline server");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            url: format!("http://{addr}/events"),
            received,
        }
    }

    pub fn received(&self) -> Vec<serde_json::Value> {
        self.received.lock().unwrap().clone()
    }
}
