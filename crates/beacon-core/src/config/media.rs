//! Inbox media download configuration.

use serde::{Deserialize, Serialize};

/// Media download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory where downloaded media files are written.
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Per-download timeout in seconds.
    #[serde(default = "default_timeout")]
    pub download_timeout_seconds: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            download_timeout_seconds: default_timeout(),
        }
    }
}

fn default_directory() -> String {
    "data/media".to_string()
}

fn default_timeout() -> u64 {
    60
}
