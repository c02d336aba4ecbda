//! Shared test helpers for integration tests.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use beacon_core::config::{
    AppConfig, AppSettings, DatabaseConfig, DispatchConfig, LoggingConfig, MediaConfig,
    RetentionConfig, TransportConfig,
};
use beacon_core::error::AppError;
use beacon_core::result::AppResult;
use beacon_entity::event::EventRecord;
use beacon_sdk::Beacon;
use beacon_service::MediaFetcher;
use beacon_worker::{DeliveryOutcome, EventTransport};

/// How the fake backend answers.
#[derive(Debug, Clone)]
pub enum Backend {
    Accept,
    Unavailable,
    Reject(String),
    Down,
}

/// Transport whose answer can be changed mid-test.
#[derive(Debug)]
pub struct ScriptedTransport {
    backend: Mutex<Backend>,
    batches: Mutex<Vec<Vec<EventRecord>>>,
}

impl ScriptedTransport {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend: Mutex::new(backend),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, backend: Backend) {
        *self.backend.lock().unwrap() = backend;
    }

    /// Every record handed over, in send order.
    pub fn sent(&self) -> Vec<EventRecord> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn sent_names(&self) -> Vec<String> {
        self.sent().iter().map(|r| r.event_name.to_string()).collect()
    }
}

#[async_trait]
impl EventTransport for ScriptedTransport {
    async fn send(&self, batch: &[EventRecord]) -> AppResult<Vec<DeliveryOutcome>> {
        self.batches.lock().unwrap().push(batch.to_vec());
        let outcome = match self.backend.lock().unwrap().clone() {
            Backend::Accept => DeliveryOutcome::Delivered,
            Backend::Unavailable => DeliveryOutcome::Retryable("503".to_string()),
            Backend::Reject(reason) => DeliveryOutcome::Rejected(reason),
            Backend::Down => return Err(AppError::transport("connection refused")),
        };
        Ok(vec![outcome; batch.len()])
    }
}

/// Writes a small file per download, optionally failing every request.
#[derive(Debug)]
pub struct DiskFetcher {
    directory: std::path::PathBuf,
    pub fail: bool,
    pub delay: Option<Duration>,
}

#[async_trait]
impl MediaFetcher for DiskFetcher {
    async fn download(&self, url: &str, file_stem: &str) -> AppResult<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AppError::transport(format!("404 for {url}")));
        }
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.directory.join(format!("{file_stem}.bin"));
        tokio::fs::write(&path, url.as_bytes()).await?;
        Ok(path.to_string_lossy().into_owned())
    }
}

/// A Beacon over a temporary directory with scripted collaborators.
pub struct TestBeacon {
    pub dir: tempfile::TempDir,
    pub transport: Arc<ScriptedTransport>,
    pub beacon: Beacon,
}

pub fn config(dir: &Path) -> AppConfig {
    AppConfig {
        app: AppSettings {
            app_id: "integration".to_string(),
            app_version: Some("2.0.0".to_string()),
            data_dir: dir.to_string_lossy().into_owned(),
            event_bus_capacity: 128,
        },
        database: DatabaseConfig::at_path(dir.join("beacon.db").to_string_lossy()),
        dispatch: DispatchConfig {
            batch_size: 10,
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

impl TestBeacon {
    pub async fn new() -> Self {
        Self::with(Backend::Accept, false, |_| {}).await
    }

    pub async fn with(
        backend: Backend,
        failing_media: bool,
        adjust: impl FnOnce(&mut AppConfig),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new(backend));
        let beacon = build(dir.path(), transport.clone(), failing_media, adjust).await;
        Self {
            dir,
            transport,
            beacon,
        }
    }

    /// Shut the instance down and open a new one over the same store.
    pub async fn reopen(self) -> Self {
        self.beacon.shutdown().await.unwrap();
        let beacon = build(self.dir.path(), self.transport.clone(), false, |_| {}).await;
        Self {
            dir: self.dir,
            transport: self.transport,
            beacon,
        }
    }
}

async fn build(
    dir: &Path,
    transport: Arc<ScriptedTransport>,
    failing_media: bool,
    adjust: impl FnOnce(&mut AppConfig),
) -> Beacon {
    let mut config = config(dir);
    adjust(&mut config);
    let fetcher = DiskFetcher {
        directory: dir.join("media"),
        fail: failing_media,
        delay: None,
    };
    Beacon::builder(config)
        .transport(transport)
        .media_fetcher(Arc::new(fetcher))
        .build()
        .await
        .unwrap()
}

/// Poll `check` until it holds or about two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
