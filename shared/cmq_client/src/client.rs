use chrono::Utc;
use reqwest::Client;
use tracing::{debug, instrument, trace};

use crate::{
    error::{CmqError, CmqResult},
    params::RequestParams,
    signer::{self, SIGNATURE_METHOD},
    types::{CmqResponse, QueueConfig, ReceivedMessage},
};

/// HTTP method every CMQ call is made with
pub const METHOD: &str = "GET";
/// `Action` value for receiving one message
pub const RECEIVE_ACTION: &str = "ReceiveMessage";
/// `Action` value for deleting one message
pub const DELETE_ACTION: &str = "DeleteMessage";

/// Result code of a successful call
pub const SUCCESS_CODE: i64 = 0;
/// Result code the service uses when the queue has nothing to deliver
pub const NO_MESSAGE_CODE: i64 = 7000;

/// The two queue operations the poller depends on
#[async_trait::async_trait]
pub trait MessageQueue: Send + Sync {
    /// Receives at most one message
    ///
    /// Returns `Ok(None)` when the queue had nothing to deliver.
    async fn receive(&self) -> CmqResult<Option<ReceivedMessage>>;

    /// Deletes the delivery identified by `receipt_handle`
    async fn delete(&self, receipt_handle: &str) -> CmqResult<()>;

    /// Name of the queue, for logging
    fn queue_name(&self) -> &str;
}

/// Signed HTTP client for a single CMQ queue
pub struct CmqClient {
    config: QueueConfig,
    http_client: Client,
}

impl CmqClient {
    /// Creates a new client for the configured queue
    ///
    /// # Errors
    ///
    /// Returns [`CmqError::Transport`] if the HTTP client cannot be built
    pub fn new(config: QueueConfig) -> CmqResult<Self> {
        let http_client = Client::builder()
            .timeout(config.effective_request_timeout())
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Returns the queue configuration
    #[must_use]
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Parameters every call carries
    fn base_params(&self, action: &str) -> RequestParams {
        let now = Utc::now();

        RequestParams::new()
            .with("Action", action)
            .with("Region", self.config.region.as_str())
            .with("Nonce", now)
            .with("SecretId", self.config.credentials.secret_id.as_str())
            .with("SignatureMethod", SIGNATURE_METHOD)
            .with("Timestamp", now)
            .with("queueName", self.config.queue_name.as_str())
    }

    /// Signs `params`, issues the GET and decodes the response document
    async fn call(&self, params: &RequestParams) -> CmqResult<CmqResponse> {
        let host_and_path = signer::strip_scheme(&self.config.url)?;

        trace!(
            canonical = %signer::canonical_request(METHOD, host_and_path, params),
            "Signing request"
        );
        let signature = signer::sign(
            METHOD,
            host_and_path,
            &self.config.credentials.secret_key,
            params,
        )?;

        let request_url = format!(
            "{}?{}",
            self.config.url,
            params.signed_query_string(&signature)
        );

        let response = self.http_client.get(request_url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        trace!(%status, body = %body, "CMQ response");

        let decoded: CmqResponse = serde_json::from_str(&body)?;
        debug!(
            code = decoded.code,
            request_id = decoded.request_id.as_deref().unwrap_or_default(),
            "CMQ call completed"
        );

        Ok(decoded)
    }
}

#[async_trait::async_trait]
impl MessageQueue for CmqClient {
    #[instrument(skip(self), fields(queue = %self.config.queue_name))]
    async fn receive(&self) -> CmqResult<Option<ReceivedMessage>> {
        let params = self.base_params(RECEIVE_ACTION).with(
            "pollingWaitSeconds",
            self.config.polling_wait_seconds,
        );

        let response = self.call(&params).await?;

        match response.code {
            SUCCESS_CODE if response.msg_body.is_empty() => Ok(None),
            SUCCESS_CODE => Ok(Some(ReceivedMessage {
                body: response.msg_body,
                receipt_handle: response.receipt_handle,
                msg_id: response.msg_id,
            })),
            NO_MESSAGE_CODE => Ok(None),
            code => Err(CmqError::Service {
                code,
                message: response.message,
            }),
        }
    }

    #[instrument(skip(self, receipt_handle), fields(queue = %self.config.queue_name))]
    async fn delete(&self, receipt_handle: &str) -> CmqResult<()> {
        let params = self
            .base_params(DELETE_ACTION)
            .with("receiptHandle", receipt_handle);

        let response = self.call(&params).await?;

        if response.code == SUCCESS_CODE {
            Ok(())
        } else {
            Err(CmqError::Service {
                code: response.code,
                message: response.message,
            })
        }
    }

    fn queue_name(&self) -> &str {
        &self.config.queue_name
    }
}
