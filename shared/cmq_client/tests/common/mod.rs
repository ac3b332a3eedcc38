use cmq_client::{mock::MockCmqServer, CmqClient, Credentials, QueueConfig};

pub const SECRET_ID: &str = "AKIDtest";
pub const SECRET_KEY: &str = "test-secret-key";

/// Initialize tracing for tests
fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn queue_config(url: String, queue_name: &str) -> QueueConfig {
    QueueConfig {
        queue_name: queue_name.to_string(),
        region: "gz".to_string(),
        url,
        credentials: Credentials {
            secret_id: SECRET_ID.to_string(),
            secret_key: SECRET_KEY.to_string(),
        },
        polling_wait_seconds: 0,
        request_timeout: None,
    }
}

pub struct ClientTestContext {
    pub server: MockCmqServer,
    pub client: CmqClient,
}

impl ClientTestContext {
    /// Starts a mock CMQ server and a client pointed at it
    pub async fn new(queue_name: &str) -> Self {
        setup_tracing();

        let server = MockCmqServer::start(SECRET_KEY)
            .await
            .expect("Failed to start mock CMQ server");
        let client = CmqClient::new(queue_config(server.url(), queue_name))
            .expect("Failed to create CMQ client");

        Self { server, client }
    }
}
