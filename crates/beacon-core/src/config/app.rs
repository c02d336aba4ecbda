//! Application identity settings.

use serde::{Deserialize, Serialize};

/// Identity of the host application and local data layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Backend application identifier sent with every batch.
    pub app_id: String,
    /// Current host application version, used for install/update detection.
    #[serde(default)]
    pub app_version: Option<String>,
    /// Root directory for SDK-owned files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Capacity of the core event bus broadcast channel.
    #[serde(default = "default_bus_capacity")]
    pub event_bus_capacity: usize,
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_bus_capacity() -> usize {
    256
}
