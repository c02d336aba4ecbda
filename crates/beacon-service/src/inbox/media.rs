//! Asynchronous media downloads for inbox messages.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beacon_core::error::AppError;
use beacon_core::events::{CoreEvent, EventBus};
use beacon_core::result::AppResult;
use beacon_entity::inbox::MediaSlot;

use super::store::InboxStore;

/// Fetches remote media into local storage.
#[async_trait]
pub trait MediaFetcher: Send + Sync + std::fmt::Debug {
    /// Download `url` and return the local path of the complete file.
    ///
    /// `file_stem` is a filesystem-safe name unique per message and slot.
    /// Implementations must not leave a file at the returned path unless
    /// the download finished, and must not leave partial files behind when
    /// the returned future is dropped.
    async fn download(&self, url: &str, file_stem: &str) -> AppResult<String>;
}

type DownloadKey = (String, MediaSlot);

/// Runs media downloads in background tasks and writes their results
/// back through the [`InboxStore`].
///
/// A download sets the slot's progress flag when it starts. On success the
/// local path is persisted and the flag cleared under the message lock; on
/// failure or cancellation only the flag is cleared.
#[derive(Debug)]
pub struct MediaDownloadService {
    inbox: Arc<InboxStore>,
    fetcher: Arc<dyn MediaFetcher>,
    bus: EventBus,
    active: Arc<DashMap<DownloadKey, CancellationToken>>,
}

impl MediaDownloadService {
    /// Creates a new download service.
    pub fn new(inbox: Arc<InboxStore>, fetcher: Arc<dyn MediaFetcher>, bus: EventBus) -> Self {
        Self {
            inbox,
            fetcher,
            bus,
            active: Arc::new(DashMap::new()),
        }
    }

    /// Start downloading the media at `slot` of `trid`.
    ///
    /// Returns `None` if that download is already running.
    pub async fn start(&self, trid: &str, slot: MediaSlot) -> AppResult<Option<JoinHandle<()>>> {
        let message = self
            .inbox
            .get(trid)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Inbox message '{trid}' not found")))?;
        let url = message
            .record
            .payload
            .media_at(slot)
            .map(|media| media.url.clone())
            .ok_or_else(|| AppError::not_found(format!("No media at {slot} of '{trid}'")))?;

        let key = slot.key();
        if !self.inbox.set_download_in_progress(trid, &key, true).await {
            debug!(trid, key = %key, "Download already running");
            return Ok(None);
        }

        let token = CancellationToken::new();
        self.active
            .insert((trid.to_string(), slot), token.clone());

        let inbox = self.inbox.clone();
        let fetcher = self.fetcher.clone();
        let bus = self.bus.clone();
        let active = self.active.clone();
        let trid = trid.to_string();
        let file_stem = file_stem(&trid, slot);

        info!(trid = %trid, key = %key, url = %url, "Media download started");
        let handle = tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => Err(AppError::cancelled("download cancelled")),
                downloaded = fetcher.download(&url, &file_stem) => downloaded,
            };

            // Unregister before the flag clears; a new start for this slot
            // can only register once the flag is free.
            active.remove(&(trid.clone(), slot));
            let event = match outcome {
                Ok(path) => match inbox.complete_download(&trid, slot, &path).await {
                    Ok(_) => {
                        info!(trid = %trid, key = %key, path = %path, "Media download completed");
                        CoreEvent::MediaDownloadCompleted {
                            trid: trid.clone(),
                            key: key.clone(),
                            path,
                        }
                    }
                    Err(e) => {
                        warn!(trid = %trid, key = %key, error = %e, "Downloaded media could not be recorded");
                        CoreEvent::MediaDownloadFailed {
                            trid: trid.clone(),
                            key: key.clone(),
                            reason: e.to_string(),
                        }
                    }
                },
                Err(e) => {
                    inbox.set_download_in_progress(&trid, &key, false).await;
                    warn!(trid = %trid, key = %key, error = %e, "Media download failed");
                    CoreEvent::MediaDownloadFailed {
                        trid: trid.clone(),
                        key: key.clone(),
                        reason: e.to_string(),
                    }
                }
            };

            bus.publish(event);
        });

        Ok(Some(handle))
    }

    /// Start downloads for every media slot of `trid`.
    pub async fn start_all(&self, trid: &str) -> AppResult<Vec<JoinHandle<()>>> {
        let message = self
            .inbox
            .get(trid)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Inbox message '{trid}' not found")))?;

        let mut handles = Vec::new();
        for slot in message.record.payload.media_slots() {
            let already_local = message
                .record
                .payload
                .media_at(slot)
                .is_some_and(|media| media.local_path.is_some());
            if already_local {
                continue;
            }
            if let Some(handle) = self.start(trid, slot).await? {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    /// Cancel a running download. Returns `false` if none was running.
    pub fn cancel(&self, trid: &str, slot: MediaSlot) -> bool {
        match self.active.get(&(trid.to_string(), slot)) {
            Some(token) => {
                token.cancel();
                debug!(trid, key = %slot, "Media download cancel requested");
                true
            }
            None => false,
        }
    }

    /// Cancel every running download.
    pub fn cancel_all(&self) {
        for entry in self.active.iter() {
            entry.value().cancel();
        }
    }

    /// Number of running downloads.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

fn file_stem(trid: &str, slot: MediaSlot) -> String {
    let safe: String = trid
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    match slot {
        MediaSlot::Main => format!("{safe}-media"),
        MediaSlot::Carousel(index) => format!("{safe}-carousel-{index}"),
    }
}
