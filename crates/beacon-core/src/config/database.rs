//! Local store configuration.

use serde::{Deserialize, Serialize};

/// SQLite connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file.
    #[serde(default = "default_path")]
    pub path: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits on a locked database, in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
    /// Connection acquire timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl DatabaseConfig {
    /// Configuration for a database file at `path` with default pool sizing.
    pub fn at_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

fn default_path() -> String {
    "data/beacon.db".to_string()
}

fn default_max_connections() -> u32 {
    4
}

fn default_busy_timeout() -> u64 {
    5_000
}

fn default_connect_timeout() -> u64 {
    10
}
