//! Cron-driven retention sweep over stored events and inbox messages.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use beacon_core::config::RetentionConfig;
use beacon_core::error::AppError;
use beacon_core::result::AppResult;
use beacon_entity::event::EventStatus;
use beacon_entity::inbox::InboxStatus;
use beacon_service::{EventStore, InboxStore};

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub events_purged: u64,
    pub inbox_deleted_purged: u64,
    pub inbox_purged: u64,
}

/// Purges records older than the configured windows.
///
/// Pending and in-progress events are never purged.
#[derive(Debug, Clone)]
pub struct RetentionSweep {
    events: Arc<EventStore>,
    inbox: Arc<InboxStore>,
    config: RetentionConfig,
}

impl RetentionSweep {
    pub fn new(events: Arc<EventStore>, inbox: Arc<InboxStore>, config: RetentionConfig) -> Self {
        Self {
            events,
            inbox,
            config,
        }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Run one sweep relative to the current time.
    pub async fn run_once(&self) -> AppResult<SweepReport> {
        self.run_at(Utc::now()).await
    }

    /// Run one sweep relative to `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();

        if let Some(hours) = self.config.event_max_age_hours {
            report.events_purged = self
                .events
                .purge(cutoff(now, hours), &[EventStatus::Success, EventStatus::Failed])
                .await?;
        }
        if let Some(hours) = self.config.inbox_deleted_max_age_hours {
            report.inbox_deleted_purged = self
                .inbox
                .purge(cutoff(now, hours), Some(InboxStatus::Deleted))
                .await?;
        }
        if let Some(hours) = self.config.inbox_max_age_hours {
            report.inbox_purged = self.inbox.purge(cutoff(now, hours), None).await?;
        }

        tracing::info!(
            "Retention sweep removed {} events, {} deleted inbox messages, {} inbox messages",
            report.events_purged,
            report.inbox_deleted_purged,
            report.inbox_purged
        );
        Ok(report)
    }
}

fn cutoff(now: DateTime<Utc>, hours: u64) -> DateTime<Utc> {
    let hours = i64::try_from(hours).unwrap_or(i64::MAX);
    Duration::try_hours(hours)
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Cron scheduler running the retention sweep
pub struct RetentionScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Sweep executed on every tick
    sweep: RetentionSweep,
}

impl std::fmt::Debug for RetentionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionScheduler").finish()
    }
}

impl RetentionScheduler {
    /// Create a new retention scheduler
    pub async fn new(sweep: RetentionSweep) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self { scheduler, sweep })
    }

    /// Register the sweep. Returns `false` when no retention window is set.
    pub async fn register(&self) -> Result<bool, AppError> {
        let config = self.sweep.config();
        if !config.is_enabled() {
            tracing::info!("Retention sweep disabled: no retention window configured");
            return Ok(false);
        }
        let schedule = config
            .schedule
            .clone()
            .ok_or_else(|| AppError::configuration("retention.schedule is not set"))?;

        let sweep = self.sweep.clone();
        let job = CronJob::new_async(schedule.as_str(), move |_uuid, _lock| {
            let sweep = sweep.clone();
            Box::pin(async move {
                tracing::debug!("Running retention sweep");
                if let Err(e) = sweep.run_once().await {
                    tracing::error!("Retention sweep failed: {}", e);
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!("Invalid retention schedule '{}': {}", schedule, e))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add retention schedule: {}", e))
        })?;

        tracing::info!("Registered: retention_sweep ({})", schedule);
        Ok(true)
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Retention scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Retention scheduler shut down");
        Ok(())
    }
}
