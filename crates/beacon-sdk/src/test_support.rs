//! In-process collaborators for SDK tests.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use beacon_core::config::{AppConfig, DatabaseConfig, DispatchConfig, LoggingConfig, MediaConfig};
use beacon_core::config::{AppSettings, RetentionConfig, TransportConfig};
use beacon_core::result::AppResult;
use beacon_entity::event::EventRecord;
use beacon_service::MediaFetcher;
use beacon_worker::{DeliveryOutcome, EventTransport};

/// Accepts every batch and remembers the event names.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn names(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventTransport for RecordingTransport {
    async fn send(&self, batch: &[EventRecord]) -> AppResult<Vec<DeliveryOutcome>> {
        self.sent
            .lock()
            .unwrap()
            .extend(batch.iter().map(|r| r.event_name.to_string()));
        Ok(vec![DeliveryOutcome::Delivered; batch.len()])
    }
}

/// Pretends every download succeeded.
#[derive(Debug)]
pub struct StaticFetcher;

#[async_trait]
impl MediaFetcher for StaticFetcher {
    async fn download(&self, _url: &str, file_stem: &str) -> AppResult<String> {
        Ok(format!("/media/{file_stem}"))
    }
}

pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        app: AppSettings {
            app_id: "test-app".to_string(),
            app_version: Some("1.0.0".to_string()),
            data_dir: dir.to_string_lossy().into_owned(),
            event_bus_capacity: 64,
        },
        database: DatabaseConfig::at_path(dir.join("beacon.db").to_string_lossy()),
        dispatch: DispatchConfig {
            batch_size: 50,
            poll_interval_seconds: 3600,
            max_attempts: 3,
            backoff_initial_ms: 0,
            backoff_max_ms: 0,
            retain_delivered: false,
        },
        retention: RetentionConfig::default(),
        media: MediaConfig {
            directory: dir.join("media").to_string_lossy().into_owned(),
            download_timeout_seconds: 5,
        },
        transport: TransportConfig::default(),
        logging: LoggingConfig::default(),
    }
}
