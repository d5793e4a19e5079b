//! Configuration for a mock server and its engine.

use crate::mock::MockError;
use crate::wait::DEFAULT_TIMEOUT_SIMULATION;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind; `None` or 0 picks an ephemeral port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Status returned for requests that match no expectation
    #[serde(default = "default_status_code")]
    pub default_status_code: u16,
    /// How long a timed-out expectation holds the request before answering
    #[serde(default = "default_timeout_simulation_ms")]
    pub timeout_simulation_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_status_code() -> u16 {
    StatusCode::NOT_IMPLEMENTED.as_u16()
}

fn default_timeout_simulation_ms() -> u64 {
    DEFAULT_TIMEOUT_SIMULATION.as_millis() as u64
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            default_status_code: default_status_code(),
            timeout_simulation_ms: default_timeout_simulation_ms(),
        }
    }
}

impl MockServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MockError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| MockError::ConfigFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&contents).map_err(|e| match e {
            MockError::Configuration { .. } => e,
            other => MockError::ConfigFile {
                path: path.display().to_string(),
                reason: other.to_string(),
            },
        })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, MockError> {
        let config: MockServerConfig =
            serde_yaml::from_str(yaml).map_err(|e| MockError::ConfigFile {
                path: "<inline>".to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), MockError> {
        if self.host.trim().is_empty() {
            return Err(MockError::configuration(&self.host, "host must not be empty"));
        }
        StatusCode::from_u16(self.default_status_code).map_err(|_| {
            MockError::configuration(
                self.default_status_code.to_string(),
                "defaultStatusCode is not a valid HTTP status code",
            )
        })?;
        if self.timeout_simulation_ms == 0 {
            return Err(MockError::configuration(
                "0",
                "timeoutSimulationMs must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_default_status(mut self, status: StatusCode) -> Self {
        self.default_status_code = status.as_u16();
        self
    }

    pub fn with_timeout_simulation(mut self, timeout: Duration) -> Self {
        self.timeout_simulation_ms = timeout.as_millis() as u64;
        self
    }

    /// Unmatched-request status; falls back to 501 for an invalid code.
    pub fn default_status(&self) -> StatusCode {
        StatusCode::from_u16(self.default_status_code).unwrap_or(StatusCode::NOT_IMPLEMENTED)
    }

    pub fn timeout_simulation(&self) -> Duration {
        Duration::from_millis(self.timeout_simulation_ms)
    }
}
