//! Backend transport configuration.

use serde::{Deserialize, Serialize};

/// Settings for the HTTP event transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Base URL of the events endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Optional API key sent as a bearer token.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            api_key: None,
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/v1/events".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}
