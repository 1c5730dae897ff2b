//! Client connection settings

use crate::error::{ClientError, Result};
use std::fmt;
use std::time::Duration;

/// Default request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings a concrete client is built from
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API endpoint, e.g. `https://cloud.example.com/client/api`
    pub api_url: String,
    pub api_key: String,
    pub secret_key: String,
    pub verify_ssl: bool,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            verify_ssl: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            return Err(ClientError::InvalidConfig("api_url is required".to_string()));
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ClientError::InvalidConfig(format!(
                "api_url must be an http(s) URL: {}",
                self.api_url
            )));
        }
        if self.api_key.is_empty() {
            return Err(ClientError::InvalidConfig("api_key is required".to_string()));
        }
        if self.secret_key.is_empty() {
            return Err(ClientError::InvalidConfig(
                "secret_key is required".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ClientError::InvalidConfig(
                "request_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("verify_ssl", &self.verify_ssl)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
