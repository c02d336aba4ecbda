//! The SDK instance.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;

use beacon_core::config::AppConfig;
use beacon_core::error::AppError;
use beacon_core::events::{CoreEvent, EventBus};
use beacon_core::result::AppResult;
use beacon_database::DatabasePool;
use beacon_entity::event::{EventPayload, EventRecord};
use beacon_service::{
    EventStore, IdentityManager, InboxStore, MediaDownloadService, NotificationService, Tracker,
};
use beacon_worker::{
    DispatchCoordinator, DispatchHandle, DispatchRunner, FlushReport, RetentionScheduler,
    RetentionSweep, SweepReport,
};

use crate::builder::BeaconBuilder;

/// Background tasks owned by a started instance.
pub(crate) struct Background {
    shutdown_tx: watch::Sender<bool>,
    runner: JoinHandle<()>,
    retention: Option<RetentionScheduler>,
}

/// A configured engagement SDK instance.
///
/// Construct one with [`Beacon::builder`], call [`Beacon::start`] to begin
/// lifecycle tracking and background dispatch, and [`Beacon::shutdown`]
/// before exit. Every service is reachable through an accessor; the
/// instance may be shared behind an `Arc`.
pub struct Beacon {
    pub(crate) config: AppConfig,
    pub(crate) pool: DatabasePool,
    pub(crate) bus: EventBus,
    pub(crate) events: Arc<EventStore>,
    pub(crate) identity: Arc<IdentityManager>,
    pub(crate) tracker: Arc<Tracker>,
    pub(crate) inbox: Arc<InboxStore>,
    pub(crate) media: Arc<MediaDownloadService>,
    pub(crate) notifications: Arc<NotificationService>,
    pub(crate) coordinator: Arc<DispatchCoordinator>,
    pub(crate) runner: Arc<DispatchRunner>,
    pub(crate) dispatch: DispatchHandle,
    pub(crate) retention: RetentionSweep,
    pub(crate) background: Mutex<Option<Background>>,
}

impl std::fmt::Debug for Beacon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Beacon")
            .field("app_id", &self.config.app.app_id)
            .finish()
    }
}

impl Beacon {
    /// Start building an instance from `config`.
    pub fn builder(config: AppConfig) -> BeaconBuilder {
        BeaconBuilder::new(config)
    }

    /// Begin background work.
    ///
    /// Recovers records stranded in flight by a previous process, tracks
    /// install/update and launch, then starts the dispatch runner and,
    /// when a retention window is configured, the retention schedule.
    pub async fn start(&self) -> AppResult<()> {
        let mut background = self.background.lock().await;
        if background.is_some() {
            return Err(AppError::invalid_state("Beacon is already started"));
        }

        self.coordinator.recover_in_flight().await?;
        self.tracker.track_app_install_update_automatically().await?;
        self.tracker.track_app_launch().await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = Arc::clone(&self.runner);
        let runner = tokio::spawn(async move {
            runner.run(shutdown_rx).await;
        });

        let retention = if self.config.retention.is_enabled() {
            let scheduler = RetentionScheduler::new(self.retention.clone()).await?;
            scheduler.register().await?;
            scheduler.start().await?;
            Some(scheduler)
        } else {
            None
        };

        *background = Some(Background {
            shutdown_tx,
            runner,
            retention,
        });
        tracing::info!("Beacon started");
        Ok(())
    }

    /// Whether [`Beacon::start`] has run without a matching shutdown.
    pub async fn is_started(&self) -> bool {
        self.background.lock().await.is_some()
    }

    /// Stop background work, cancel media downloads and close the store.
    pub async fn shutdown(&self) -> AppResult<()> {
        if let Some(mut background) = self.background.lock().await.take() {
            let _ = background.shutdown_tx.send(true);
            if let Err(e) = background.runner.await {
                tracing::error!("Dispatch runner task failed: {}", e);
            }
            if let Some(scheduler) = background.retention.as_mut() {
                scheduler.shutdown().await?;
            }
        }
        self.media.cancel_all();
        self.pool.close().await;
        tracing::info!("Beacon shut down");
        Ok(())
    }

    /// Wake the dispatch runner for an immediate flush.
    pub fn process_events_manually(&self) {
        self.dispatch.process_now();
    }

    /// Flush one batch on the calling task and report the outcome.
    pub async fn flush(&self) -> AppResult<FlushReport> {
        self.coordinator.flush().await
    }

    /// Run one retention sweep now.
    pub async fn sweep(&self) -> AppResult<SweepReport> {
        self.retention.run_once().await
    }

    /// Track an application-defined event.
    pub async fn track_event(
        &self,
        name: &str,
        payload: EventPayload,
    ) -> AppResult<Option<EventRecord>> {
        self.tracker.track_event(name, payload).await
    }

    /// Subscribe to deeplinks, inbox arrivals, media completions and
    /// dropped events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.bus.subscribe()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventStore> {
        &self.events
    }

    pub fn identity(&self) -> &Arc<IdentityManager> {
        &self.identity
    }

    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    pub fn inbox(&self) -> &Arc<InboxStore> {
        &self.inbox
    }

    pub fn media(&self) -> &Arc<MediaDownloadService> {
        &self.media
    }

    pub fn notifications(&self) -> &Arc<NotificationService> {
        &self.notifications
    }

    pub fn coordinator(&self) -> &Arc<DispatchCoordinator> {
        &self.coordinator
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}
