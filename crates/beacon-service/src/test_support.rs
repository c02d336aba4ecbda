//! Shared fixtures for service tests.

use std::sync::Arc;

use beacon_core::config::DatabaseConfig;
use beacon_database::DatabasePool;
use beacon_database::migration::run_migrations;
use beacon_database::repositories::{EventRepository, InboxRepository, PreferenceRepository};

use crate::event::EventStore;
use crate::identity::IdentityManager;
use crate::inbox::InboxStore;
use crate::tracking::Tracker;

/// A migrated store in a temporary directory.
pub struct TestDb {
    _dir: tempfile::TempDir,
    pub pool: DatabasePool,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.db");
        let pool = DatabasePool::connect(&DatabaseConfig::at_path(path.to_string_lossy()))
            .await
            .unwrap();
        run_migrations(pool.pool()).await.unwrap();
        Self { _dir: dir, pool }
    }

    pub fn event_store(&self) -> Arc<EventStore> {
        Arc::new(EventStore::new(EventRepository::new(self.pool.pool().clone())))
    }

    pub fn preferences(&self) -> PreferenceRepository {
        PreferenceRepository::new(self.pool.pool().clone())
    }

    pub fn inbox_store(&self) -> Arc<InboxStore> {
        Arc::new(InboxStore::new(InboxRepository::new(self.pool.pool().clone())))
    }

    pub async fn identity(&self, events: Arc<EventStore>) -> Arc<IdentityManager> {
        Arc::new(IdentityManager::load(self.preferences(), events).await.unwrap())
    }

    pub async fn tracker(&self, app_version: Option<&str>) -> (Arc<EventStore>, Arc<Tracker>) {
        let events = self.event_store();
        let identity = self.identity(events.clone()).await;
        let tracker = Arc::new(Tracker::new(
            identity,
            self.preferences(),
            app_version.map(str::to_string),
        ));
        (events, tracker)
    }
}

/// Make every event insert fail until [`unblock_event_inserts`].
pub async fn block_event_inserts(db: &TestDb) {
    sqlx::query(
        "CREATE TRIGGER block_event_inserts BEFORE INSERT ON event_records \
         BEGIN SELECT RAISE(ABORT, 'blocked'); END",
    )
    .execute(db.pool.pool())
    .await
    .unwrap();
}

pub async fn unblock_event_inserts(db: &TestDb) {
    sqlx::query("DROP TRIGGER block_event_inserts")
        .execute(db.pool.pool())
        .await
        .unwrap();
}
