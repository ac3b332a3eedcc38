use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Extra time granted on top of the long-poll wait before a request times out
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 5;

/// Account credentials used to sign requests
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Secret identifier, sent in clear as `SecretId`
    pub secret_id: String,
    /// Secret key, only ever used as the HMAC key
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Identity of the queue plus the settings for talking to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Queue name, sent as `queueName`
    pub queue_name: String,
    /// Region, sent as `Region`
    pub region: String,
    /// Endpoint, e.g. `https://cmq-queue-gz.api.qcloud.com/v2/index.php`
    pub url: String,
    /// Signing credentials
    pub credentials: Credentials,
    /// Long-poll hint sent as `pollingWaitSeconds`
    pub polling_wait_seconds: u32,
    /// Per-request timeout, defaults to the long-poll wait plus a margin
    pub request_timeout: Option<Duration>,
}

impl QueueConfig {
    /// Timeout applied to every HTTP call
    #[must_use]
    pub fn effective_request_timeout(&self) -> Duration {
        self.request_timeout.unwrap_or_else(|| {
            Duration::from_secs(u64::from(self.polling_wait_seconds) + REQUEST_TIMEOUT_MARGIN_SECS)
        })
    }
}

/// A message taken from the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Opaque message body
    pub body: String,
    /// One-time token needed to delete this delivery
    pub receipt_handle: String,
    /// Service message id, when returned
    pub msg_id: Option<String>,
}

/// Response document shared by `ReceiveMessage` and `DeleteMessage`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct CmqResponse {
    pub code: i64,
    pub message: String,
    pub request_id: Option<String>,
    pub msg_id: Option<String>,
    pub msg_body: String,
    pub receipt_handle: String,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn config(timeout: Option<Duration>) -> QueueConfig {
        QueueConfig {
            queue_name: "q".to_string(),
            region: "gz".to_string(),
            url: "https://cmq.example.com/v2/index.php".to_string(),
            credentials: Credentials {
                secret_id: "id".to_string(),
                secret_key: "very-secret".to_string(),
            },
            polling_wait_seconds: 10,
            request_timeout: timeout,
        }
    }

    #[test]
    fn test_debug_redacts_secret_key() {
        let rendered = format!("{:?}", config(None));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn test_request_timeout_defaults_to_wait_plus_margin() {
        assert_eq!(config(None).effective_request_timeout(), Duration::from_secs(15));
        assert_eq!(
            config(Some(Duration::from_secs(3))).effective_request_timeout(),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_response_fields_default_when_missing() {
        let response: CmqResponse = serde_json::from_str(r#"{"code":4000,"message":"boom"}"#).unwrap();
        assert_eq!(response.code, 4000);
        assert_eq!(response.message, "boom");
        assert!(response.msg_body.is_empty());
        assert!(response.receipt_handle.is_empty());
        assert_eq!(response.msg_id, None);
    }
}
