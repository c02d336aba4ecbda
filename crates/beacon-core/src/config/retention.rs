//! Retention sweep configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Windows after which stored records are purged.
///
/// Every window is optional. With no window configured the sweep is not
/// scheduled at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Six-field cron expression (with seconds) for the sweep.
    #[serde(default)]
    pub schedule: Option<String>,
    /// Age in hours after which delivered or failed events are purged.
    #[serde(default)]
    pub event_max_age_hours: Option<u64>,
    /// Age in hours after which deleted inbox records are purged.
    #[serde(default)]
    pub inbox_deleted_max_age_hours: Option<u64>,
    /// Age in hours after which any inbox record is purged.
    #[serde(default)]
    pub inbox_max_age_hours: Option<u64>,
}

impl RetentionConfig {
    /// Whether any retention window is configured.
    pub fn is_enabled(&self) -> bool {
        self.event_max_age_hours.is_some()
            || self.inbox_deleted_max_age_hours.is_some()
            || self.inbox_max_age_hours.is_some()
    }

    /// A schedule is mandatory once a window is set.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.is_enabled() && self.schedule.as_deref().is_none_or(str::is_empty) {
            return Err(AppError::configuration(
                "retention.schedule is required when a retention window is configured",
            ));
        }
        Ok(())
    }
}
