//! Client configuration.
//!
//! A [`ClientConfig`] can be built in code, loaded from a YAML file, or taken from the
//! environment.  Every field has a default, so a file only needs to name what it changes.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::TransportKind;
use crate::watchdog::DEFAULT_COLD_START_THRESHOLD;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5001";

/// Environment variable that overrides the base URL.
pub const BASE_URL_ENV: &str = "CTF_BASE_URL";

/// Default overall timeout for one request, in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Configuration for a [`CtfClient`](crate::CtfClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Where the backend lives.  API paths are resolved relative to this.
    pub base_url: String,

    /// How streamed replies are delivered.
    pub transport: TransportKind,

    /// How long to wait for the first data before showing the cold-start notice.
    pub cold_start_threshold_ms: u64,

    /// Overall timeout for one request.  `None` or zero disables it.
    pub request_timeout_secs: Option<u64>,
}

impl ClientConfig {
    /// Creates a configuration with default values.
    ///
    /// Defaults:
    /// - Base URL: http://localhost:5001
    /// - Transport: buffered
    /// - Cold-start threshold: 2000 ms
    /// - Request timeout: 60 s
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            transport: TransportKind::default(),
            cold_start_threshold_ms: u64::try_from(DEFAULT_COLD_START_THRESHOLD.as_millis())
                .unwrap_or(u64::MAX),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Default configuration with the base URL taken from `CTF_BASE_URL`, when set.
    pub fn from_env() -> Self {
        Self::new().with_env_overrides()
    }

    /// Applies `CTF_BASE_URL`, when set, over this configuration.
    pub fn with_env_overrides(self) -> Self {
        match env::var(BASE_URL_ENV) {
            Ok(base_url) if !base_url.trim().is_empty() => self.with_base_url(base_url.trim()),
            _ => self,
        }
    }

    /// Loads a configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("could not read {}", path.display()), e))?;
        Self::from_yaml(&content)
    }

    /// Parses a configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            Error::serialization(format!("invalid configuration: {e}"), Some(Box::new(e)))
        })
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the transport.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the cold-start threshold.
    pub fn with_cold_start_threshold(mut self, threshold: Duration) -> Self {
        self.cold_start_threshold_ms = u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout_secs = timeout.map(|t| t.as_secs());
        self
    }

    /// The cold-start threshold as a duration.
    pub fn cold_start_threshold(&self) -> Duration {
        Duration::from_millis(self.cold_start_threshold_ms)
    }

    /// The request timeout as a duration.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::new();
        assert_eq!(config.base_url, "http://localhost:5001");
        assert_eq!(config.transport, TransportKind::Buffered);
        assert_eq!(config.cold_start_threshold(), Duration::from_millis(2000));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ClientConfig::from_yaml("base_url: https://ctf.example.com\ntransport: push\n")
            .unwrap();
        assert_eq!(config.base_url, "https://ctf.example.com");
        assert_eq!(config.transport, TransportKind::Push);
        assert_eq!(config.cold_start_threshold_ms, 2000);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let err = ClientConfig::from_yaml("transport: carrier-pigeon\n").unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[test]
    fn builder_pattern() {
        let config = ClientConfig::new()
            .with_base_url("http://127.0.0.1:9000")
            .with_transport(TransportKind::Push)
            .with_cold_start_threshold(Duration::from_millis(250))
            .with_request_timeout(None);
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.transport, TransportKind::Push);
        assert_eq!(config.cold_start_threshold_ms, 250);
        assert!(config.request_timeout().is_none());
        let config = ClientConfig::new().with_request_timeout(Some(Duration::ZERO));
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn oversized_threshold_saturates() {
        let config = ClientConfig::new().with_cold_start_threshold(Duration::MAX);
        assert_eq!(config.cold_start_threshold_ms, u64::MAX);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ClientConfig::from_file("/nonexistent/ctf-client.yaml").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
