//! Assembles a [`Beacon`] from configuration and collaborators.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use beacon_core::config::AppConfig;
use beacon_core::events::EventBus;
use beacon_core::result::AppResult;
use beacon_database::DatabasePool;
use beacon_database::migration::run_migrations;
use beacon_database::repositories::{EventRepository, InboxRepository, PreferenceRepository};
use beacon_net::{HttpMediaFetcher, HttpTransport};
use beacon_service::{
    EventStore, IdentityManager, InboxStore, MediaDownloadService, MediaFetcher,
    NotificationService, Tracker,
};
use beacon_worker::{
    BackoffPolicy, DispatchCoordinator, DispatchRunner, EventTransport, ExponentialBackoff,
    RetentionSweep,
};

use crate::beacon::Beacon;

/// Builder for [`Beacon`].
///
/// Collaborators not supplied fall back to the HTTP implementations
/// configured by `transport` and `media`.
#[derive(Debug)]
pub struct BeaconBuilder {
    config: AppConfig,
    transport: Option<Arc<dyn EventTransport>>,
    fetcher: Option<Arc<dyn MediaFetcher>>,
    backoff: Option<Arc<dyn BackoffPolicy>>,
}

impl BeaconBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            transport: None,
            fetcher: None,
            backoff: None,
        }
    }

    /// Use `transport` for event dispatch.
    pub fn transport(mut self, transport: Arc<dyn EventTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use `fetcher` for inbox media downloads.
    pub fn media_fetcher(mut self, fetcher: Arc<dyn MediaFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use `backoff` instead of the configured exponential policy.
    pub fn backoff(mut self, backoff: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Open the store, run migrations and wire every service.
    pub async fn build(self) -> AppResult<Beacon> {
        let config = self.config;
        config.validate()?;

        tracing::info!("Initializing Beacon for app '{}'", config.app.app_id);
        tokio::fs::create_dir_all(&config.app.data_dir).await?;

        // ── Store ────────────────────────────────────────────────────
        let pool = DatabasePool::connect(&config.database).await?;
        tracing::info!("Running database migrations...");
        run_migrations(pool.pool()).await?;

        let bus = EventBus::new(config.app.event_bus_capacity);

        // ── Services ─────────────────────────────────────────────────
        let events = Arc::new(EventStore::new(EventRepository::new(pool.pool().clone())));
        let identity = Arc::new(
            IdentityManager::load(PreferenceRepository::new(pool.pool().clone()), events.clone())
                .await?,
        );
        let tracker = Arc::new(Tracker::new(
            identity.clone(),
            PreferenceRepository::new(pool.pool().clone()),
            config.app.app_version.clone(),
        ));
        let inbox = Arc::new(InboxStore::new(InboxRepository::new(pool.pool().clone())));

        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpMediaFetcher::new(&config.media)?),
        };
        let media = Arc::new(MediaDownloadService::new(inbox.clone(), fetcher, bus.clone()));
        let notifications = Arc::new(NotificationService::new(
            inbox.clone(),
            tracker.clone(),
            bus.clone(),
        ));

        // ── Dispatch ─────────────────────────────────────────────────
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&config.transport, &config.app.app_id)?),
        };
        let backoff = self
            .backoff
            .unwrap_or_else(|| Arc::new(ExponentialBackoff::from_config(&config.dispatch)));
        let coordinator = Arc::new(DispatchCoordinator::new(
            events.clone(),
            transport,
            backoff,
            bus.clone(),
            config.dispatch.clone(),
        ));
        let runner = Arc::new(DispatchRunner::new(
            coordinator.clone(),
            Duration::from_secs(config.dispatch.poll_interval_seconds),
        ));
        let retention = RetentionSweep::new(events.clone(), inbox.clone(), config.retention.clone());

        tracing::info!(
            "Beacon ready (device {})",
            identity.device_guid()
        );

        Ok(Beacon {
            config,
            pool,
            bus,
            events,
            identity,
            tracker,
            inbox,
            media,
            notifications,
            coordinator,
            dispatch: runner.handle(),
            runner,
            retention,
            background: Mutex::new(None),
        })
    }
}
