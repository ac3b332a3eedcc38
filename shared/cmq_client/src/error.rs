use thiserror::Error;

/// Result type alias for queue operations
pub type CmqResult<T> = Result<T, CmqError>;

/// Error types for queue operations
///
/// Every variant is scoped to the call that produced it; none of them mean
/// the client is unusable for the next call.
#[derive(Error, Debug)]
pub enum CmqError {
    /// The configured base URL does not start with `http://` or `https://`
    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    /// The secret key could not seed the request MAC
    #[error("Invalid signing key: {0}")]
    InvalidKey(#[from] hmac::digest::InvalidLength),

    /// Connection, timeout or body read failure
    #[error("Request to CMQ failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the expected JSON document
    #[error("Failed to decode CMQ response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The service answered with a non-zero code
    #[error("CMQ service error (code {code}): {message}")]
    Service {
        /// Service result code
        code: i64,
        /// Service provided description
        message: String,
    },
}

impl CmqError {
    /// Returns the service result code, if this error came from the service
    #[must_use]
    pub const fn service_code(&self) -> Option<i64> {
        match self {
            Self::Service { code, .. } => Some(*code),
            _ => None,
        }
    }
}
