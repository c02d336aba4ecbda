//! One-off retention sweep.

use crate::output::{self, OutputFormat};
use beacon_core::error::AppError;

/// Execute the sweep command
pub async fn execute(config_path: &str, format: OutputFormat) -> Result<(), AppError> {
    let beacon = super::open_beacon(config_path).await?;
    if !beacon.config().retention.is_enabled() {
        output::print_warning("No retention window configured; nothing to purge.");
    }
    let report = beacon.sweep().await?;
    output::print_item(&report, format);
    beacon.shutdown().await
}
