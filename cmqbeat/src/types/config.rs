//! Beat configuration loaded from a TOML file
//!
//! ```toml
//! period = 1.0
//!
//! [cmq]
//! queuename = "orders"
//! url = "https://cmq-queue-gz.api.qcloud.com/v2/index.php"
//! region = "gz"
//! secretid = "AKID..."
//! secretkey = "..."
//! pollingwaitseconds = 10
//!
//! [output]
//! kind = "stdout"
//! ```
//!
//! `CMQ_SECRET_ID` and `CMQ_SECRET_KEY` override the file values when set.

use std::{path::Path, time::Duration};

use cmq_client::{Credentials, QueueConfig};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable overriding `cmq.secretid`
pub const SECRET_ID_ENV: &str = "CMQ_SECRET_ID";
/// Environment variable overriding `cmq.secretkey`
pub const SECRET_KEY_ENV: &str = "CMQ_SECRET_KEY";

/// Longest accepted poll period
pub const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors raised while loading the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Path that was read
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The file is not valid TOML or has the wrong shape
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is present but unusable
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level beat configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BeatConfig {
    /// Value of the `type` field on published events
    #[serde(default = "default_name")]
    pub name: String,
    /// Poll interval in seconds
    #[serde(default = "default_period", rename = "period")]
    pub period_secs: f64,
    /// Port for the `/health` endpoint, disabled when absent
    #[serde(default)]
    pub health_port: Option<u16>,
    /// Queue settings
    pub cmq: CmqSettings,
    /// Downstream pipeline settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Queue settings, keys as they appear in the config file
#[derive(Clone, Deserialize)]
pub struct CmqSettings {
    /// Queue name
    #[serde(rename = "queuename")]
    pub queue_name: String,
    /// Endpoint URL
    pub url: String,
    /// Region
    pub region: String,
    /// Secret id
    #[serde(default, rename = "secretid")]
    pub secret_id: String,
    /// Secret key
    #[serde(default, rename = "secretkey")]
    pub secret_key: String,
    /// Long-poll wait sent with every receive
    #[serde(default, rename = "pollingwaitseconds")]
    pub polling_wait_seconds: u32,
    /// Per-request timeout override in seconds
    #[serde(default, rename = "requesttimeoutseconds")]
    pub request_timeout_seconds: Option<u64>,
}

impl std::fmt::Debug for CmqSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmqSettings")
            .field("queue_name", &self.queue_name)
            .field("url", &self.url)
            .field("region", &self.region)
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .field("polling_wait_seconds", &self.polling_wait_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

/// Where published events go
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutputConfig {
    /// One JSON document per line on stdout
    #[default]
    Stdout,
    /// JSON `POST` to an HTTP endpoint
    Http {
        /// Endpoint receiving the events
        url: String,
    },
}

fn default_name() -> String {
    "cmqbeat".to_string()
}

const fn default_period() -> f64 {
    1.0
}

impl BeatConfig {
    /// Reads, overrides from the environment and validates a config file
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed, or if
    /// the resulting configuration is invalid
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut config = Self::from_toml_str(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parses a config document without overrides or validation
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is malformed
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Replaces secrets with the values `lookup` finds for
    /// [`SECRET_ID_ENV`] and [`SECRET_KEY_ENV`]
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret_id) = lookup(SECRET_ID_ENV).filter(|v| !v.is_empty()) {
            self.cmq.secret_id = secret_id;
        }
        if let Some(secret_key) = lookup(SECRET_KEY_ENV).filter(|v| !v.is_empty()) {
            self.cmq.secret_key = secret_key;
        }
    }

    /// Checks the values the poller cannot work without
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Sub-nanosecond values round to zero, which the ticker rejects
        let period_ok = Duration::try_from_secs_f64(self.period_secs)
            .is_ok_and(|period| !period.is_zero() && period <= MAX_PERIOD);
        if !period_ok {
            return Err(ConfigError::Invalid(format!(
                "period must be a positive number of seconds up to {}, got {}",
                MAX_PERIOD.as_secs(),
                self.period_secs
            )));
        }

        let required = [
            ("cmq.queuename", &self.cmq.queue_name),
            ("cmq.region", &self.cmq.region),
            ("cmq.secretid", &self.cmq.secret_id),
            ("cmq.secretkey", &self.cmq.secret_key),
        ];
        if let Some((key, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("{key} must not be empty")));
        }

        cmq_client::signer::strip_scheme(&self.cmq.url)
            .map_err(|_| ConfigError::Invalid(format!("cmq.url is not an http(s) url: {}", self.cmq.url)))?;

        if let OutputConfig::Http { url } = &self.output {
            if url.trim().is_empty() {
                return Err(ConfigError::Invalid("output.url must not be empty".to_string()));
            }
        }

        Ok(())
    }

    /// Poll interval
    ///
    /// Values that fail [`Self::validate`] fall back to the default period.
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(self.period_secs)
            .ok()
            .filter(|period| !period.is_zero() && *period <= MAX_PERIOD)
            .unwrap_or_else(|| Duration::from_secs_f64(default_period()))
    }

    /// Queue client configuration
    #[must_use]
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            queue_name: self.cmq.queue_name.clone(),
            region: self.cmq.region.clone(),
            url: self.cmq.url.clone(),
            credentials: Credentials {
                secret_id: self.cmq.secret_id.clone(),
                secret_key: self.cmq.secret_key.clone(),
            },
            polling_wait_seconds: self.cmq.polling_wait_seconds,
            request_timeout: self.cmq.request_timeout_seconds.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use serial_test::serial;

    use super::*;

    const MINIMAL: &str = r#"
        [cmq]
        queuename = "orders"
        url = "https://cmq-queue-gz.api.qcloud.com/v2/index.php"
        region = "gz"
        secretid = "AKIDfile"
        secretkey = "file-key"
    "#;

    #[test]
    fn test_defaults_are_applied() {
        let config = BeatConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.name, "cmqbeat");
        assert_eq!(config.period(), Duration::from_secs(1));
        assert_eq!(config.health_port, None);
        assert_eq!(config.output, OutputConfig::Stdout);
        assert_eq!(config.cmq.polling_wait_seconds, 0);
        config.validate().unwrap();
    }

    #[test]
    fn test_full_config_parses() {
        let config = BeatConfig::from_toml_str(
            r#"
            name = "orders-beat"
            period = 0.5
            health_port = 8001

            [cmq]
            queuename = "orders"
            url = "http://localhost:9000/v2/index.php"
            region = "sh"
            secretid = "id"
            secretkey = "key"
            pollingwaitseconds = 20
            requesttimeoutseconds = 40

            [output]
            kind = "http"
            url = "http://localhost:8080/events"
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "orders-beat");
        assert_eq!(config.period(), Duration::from_millis(500));
        assert_eq!(config.health_port, Some(8001));
        assert_eq!(
            config.output,
            OutputConfig::Http {
                url: "http://localhost:8080/events".to_string()
            }
        );

        let queue = config.queue_config();
        assert_eq!(queue.queue_name, "orders");
        assert_eq!(queue.region, "sh");
        assert_eq!(queue.polling_wait_seconds, 20);
        assert_eq!(queue.effective_request_timeout(), Duration::from_secs(40));
    }

    #[test]
    fn test_overrides_replace_secrets() {
        let mut config = BeatConfig::from_toml_str(MINIMAL).unwrap();
        config.apply_overrides(|key| match key {
            SECRET_ID_ENV => Some("AKIDenv".to_string()),
            SECRET_KEY_ENV => Some("env-key".to_string()),
            _ => None,
        });

        assert_eq!(config.cmq.secret_id, "AKIDenv");
        assert_eq!(config.cmq.secret_key, "env-key");
    }

    #[test]
    fn test_empty_overrides_are_ignored() {
        let mut config = BeatConfig::from_toml_str(MINIMAL).unwrap();
        config.apply_overrides(|_| Some(String::new()));

        assert_eq!(config.cmq.secret_id, "AKIDfile");
        assert_eq!(config.cmq.secret_key, "file-key");
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            ("period = 0\n", "period"),
            ("period = -1.5\n", "period"),
            ("period = 1e-10\n", "period"),
            ("period = 1e30\n", "period"),
            ("period = 86401\n", "period"),
            ("period = nan\n", "period"),
            ("period = inf\n", "period"),
        ];
        for (prefix, expected) in cases {
            let config = BeatConfig::from_toml_str(&format!("{prefix}{MINIMAL}")).unwrap();
            let err = config.validate().unwrap_err().to_string();
            assert!(err.contains(expected), "{err}");
        }

        let mut config = BeatConfig::from_toml_str(MINIMAL).unwrap();
        config.cmq.secret_key = "  ".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("cmq.secretkey"), "{err}");

        let mut config = BeatConfig::from_toml_str(MINIMAL).unwrap();
        config.cmq.url = "cmq-queue-gz.api.qcloud.com/v2/index.php".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("cmq.url"), "{err}");

        let mut config = BeatConfig::from_toml_str(MINIMAL).unwrap();
        config.output = OutputConfig::Http { url: String::new() };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("output.url"), "{err}");
    }

    #[test]
    fn test_period_never_panics_on_out_of_range_values() {
        for prefix in ["period = 1e-10\n", "period = 1e30\n", "period = -inf\n"] {
            let config = BeatConfig::from_toml_str(&format!("{prefix}{MINIMAL}")).unwrap();
            assert_eq!(config.period(), Duration::from_secs(1));
        }

        let config = BeatConfig::from_toml_str(&format!("period = 1e-9\n{MINIMAL}")).unwrap();
        config.validate().unwrap();
        assert!(!config.period().is_zero());

        let config = BeatConfig::from_toml_str(&format!("period = 86400\n{MINIMAL}")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.period(), MAX_PERIOD);
    }

    #[test]
    fn test_missing_cmq_section_is_parse_error() {
        let err = BeatConfig::from_toml_str("period = 1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_debug_redacts_secret_key() {
        let config = BeatConfig::from_toml_str(MINIMAL).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("file-key"));
    }

    #[test]
    #[serial]
    fn test_load_reads_file_and_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        std::env::set_var(SECRET_KEY_ENV, "from-env");
        std::env::remove_var(SECRET_ID_ENV);
        let config = BeatConfig::load(file.path()).unwrap();
        std::env::remove_var(SECRET_KEY_ENV);

        assert_eq!(config.cmq.secret_id, "AKIDfile");
        assert_eq!(config.cmq.secret_key, "from-env");
    }

    #[test]
    fn test_load_missing_file() {
        let err = BeatConfig::load(Path::new("/nonexistent/cmqbeat.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
