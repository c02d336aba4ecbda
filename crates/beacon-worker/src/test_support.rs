//! Shared fixtures for worker tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use beacon_core::config::{DatabaseConfig, DispatchConfig};
use beacon_core::error::AppError;
use beacon_core::result::AppResult;
use beacon_database::DatabasePool;
use beacon_database::migration::run_migrations;
use beacon_database::repositories::{EventRepository, InboxRepository};
use beacon_entity::event::EventRecord;
use beacon_service::{EventStore, InboxStore};

use crate::transport::{DeliveryOutcome, EventTransport};

/// A migrated store in a temporary directory.
pub struct TestDb {
    _dir: tempfile::TempDir,
    pub pool: DatabasePool,
    pub events: Arc<EventStore>,
    pub inbox: Arc<InboxStore>,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.db");
        let pool = DatabasePool::connect(&DatabaseConfig::at_path(path.to_string_lossy()))
            .await
            .unwrap();
        run_migrations(pool.pool()).await.unwrap();
        let events = Arc::new(EventStore::new(EventRepository::new(pool.pool().clone())));
        let inbox = Arc::new(InboxStore::new(InboxRepository::new(pool.pool().clone())));
        Self {
            _dir: dir,
            pool,
            events,
            inbox,
        }
    }
}

/// Dispatch settings with immediate retries.
pub fn dispatch_config() -> DispatchConfig {
    DispatchConfig {
        batch_size: 50,
        poll_interval_seconds: 30,
        max_attempts: 3,
        backoff_initial_ms: 0,
        backoff_max_ms: 0,
        retain_delivered: false,
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Deliver,
    Error,
    Retry,
    Reject,
}

/// Records every batch and answers with a fixed outcome.
#[derive(Debug)]
pub struct FakeTransport {
    mode: Mode,
    delay: Option<Duration>,
    sent: Mutex<Vec<String>>,
}

impl FakeTransport {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            delay: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn delivering() -> Self {
        Self::with_mode(Mode::Deliver)
    }

    pub fn erroring() -> Self {
        Self::with_mode(Mode::Error)
    }

    pub fn retrying() -> Self {
        Self::with_mode(Mode::Retry)
    }

    pub fn rejecting() -> Self {
        Self::with_mode(Mode::Reject)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent_names(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventTransport for FakeTransport {
    async fn send(&self, batch: &[EventRecord]) -> AppResult<Vec<DeliveryOutcome>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent
            .lock()
            .unwrap()
            .extend(batch.iter().map(|r| r.event_name.to_string()));
        let outcome = match self.mode {
            Mode::Deliver => DeliveryOutcome::Delivered,
            Mode::Retry => DeliveryOutcome::Retryable("503".to_string()),
            Mode::Reject => DeliveryOutcome::Rejected("400".to_string()),
            Mode::Error => return Err(AppError::transport("connection refused")),
        };
        Ok(vec![outcome; batch.len()])
    }
}
