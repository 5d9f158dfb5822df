use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

const fn default_precision() -> Precision {
    Precision::Seconds
}

const fn default_request_timeout_ms() -> u64 {
    SinkConfig::DEFAULT_REQUEST_TIMEOUT_MS
}

/// Timestamp precision of the records written to the sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    #[serde(rename = "n", alias = "ns")]
    Nanoseconds,
    #[serde(rename = "u", alias = "us")]
    Microseconds,
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
}

impl Precision {
    /// Value of the `precision` query parameter of the write endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Nanoseconds => "n",
            Precision::Microseconds => "u",
            Precision::Milliseconds => "ms",
            Precision::Seconds => "s",
            Precision::Minutes => "m",
            Precision::Hours => "h",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-series store the extracted records are written to.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SinkConfig {
    /// Base URL of the server, e.g. `http://localhost:8086`.
    pub url: String,
    /// Database the records are written into.
    pub database: String,
    /// Basic auth user.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic auth password.
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default = "default_precision")]
    pub precision: Precision,
    /// Upper bound for a single write request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl SinkConfig {
    /// Default request timeout in milliseconds.
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::invalid("sink.url", "must not be empty"));
        }

        if self.database.trim().is_empty() {
            return Err(ValidationError::invalid("sink.database", "must not be empty"));
        }

        if self.request_timeout_ms == 0 {
            return Err(ValidationError::invalid(
                "sink.request_timeout_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Same as [`SinkConfig`] but without secrets.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SinkConfigWithoutSecrets {
    pub url: String,
    pub database: String,
    pub username: Option<String>,
    pub precision: Precision,
    pub request_timeout_ms: u64,
}

impl From<SinkConfig> for SinkConfigWithoutSecrets {
    fn from(value: SinkConfig) -> Self {
        SinkConfigWithoutSecrets {
            url: value.url,
            database: value.database,
            username: value.username,
            precision: value.precision,
            request_timeout_ms: value.request_timeout_ms,
        }
    }
}
