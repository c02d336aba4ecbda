//! SDK configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! an optional TOML file overlaid with `BEACON__`-prefixed environment
//! variables. Each sub-module represents a logical configuration section.

pub mod app;
pub mod database;
pub mod dispatch;
pub mod logging;
pub mod media;
pub mod retention;
pub mod transport;

use serde::{Deserialize, Serialize};

pub use self::app::AppSettings;
pub use self::database::DatabaseConfig;
pub use self::dispatch::DispatchConfig;
pub use self::logging::LoggingConfig;
pub use self::media::MediaConfig;
pub use self::retention::RetentionConfig;
pub use self::transport::TransportConfig;

use crate::error::AppError;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application identity and local data settings.
    pub app: AppSettings,
    /// Local store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Event dispatch and retry policy. Retry keys have no defaults.
    pub dispatch: DispatchConfig,
    /// Retention sweep settings. Disabled unless windows are configured.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Media download settings.
    #[serde(default)]
    pub media: MediaConfig,
    /// Backend transport settings.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file and the environment.
    ///
    /// The file is optional; `BEACON__DISPATCH__MAX_ATTEMPTS=5` style
    /// variables override individual keys.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("BEACON")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        self.dispatch.validate()?;
        self.retention.validate()?;
        if self.app.app_id.trim().is_empty() {
            return Err(AppError::configuration("app.app_id must not be empty"));
        }
        Ok(())
    }
}
