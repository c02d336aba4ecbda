//! App inbox message store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use beacon_core::error::AppError;
use beacon_core::result::AppResult;
use beacon_database::repositories::InboxRepository;
use beacon_entity::inbox::{
    InboxFilter, InboxMessage, InboxRecord, InboxStatus, MediaSlot, NotificationPayload,
    StatusUpdate,
};

use super::progress::DownloadProgress;

/// Inbox message store.
///
/// Mutations of one message are serialized by a per-`trid` async lock, so
/// read-modify-write sequences (status resolution, media path updates)
/// never lose a concurrent update. Download progress lives in a separate
/// in-memory table and is merged into [`InboxMessage`] views on read.
#[derive(Debug)]
pub struct InboxStore {
    repo: InboxRepository,
    locks: DashMap<String, Arc<Mutex<()>>>,
    progress: DownloadProgress,
}

impl InboxStore {
    /// Creates a new inbox store.
    pub fn new(repo: InboxRepository) -> Self {
        Self {
            repo,
            locks: DashMap::new(),
            progress: DownloadProgress::new(),
        }
    }

    async fn lock(&self, trid: &str) -> TridGuard<'_> {
        let lock = self.locks.entry(trid.to_string()).or_default().clone();
        TridGuard {
            locks: &self.locks,
            trid: trid.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }

    async fn find_existing(&self, trid: &str) -> AppResult<InboxRecord> {
        self.repo
            .find(trid)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Inbox message '{trid}' not found")))
    }

    /// Store a message, replacing the payload and publish time of an
    /// existing `trid`.
    pub async fn upsert(
        &self,
        trid: &str,
        payload: NotificationPayload,
        published_at: DateTime<Utc>,
    ) -> AppResult<InboxRecord> {
        if trid.trim().is_empty() {
            return Err(AppError::validation("inbox trid must not be empty"));
        }

        let _guard = self.lock(trid).await;
        if let Some(existing) = self.repo.find(trid).await? {
            if existing.is_deleted() {
                return Err(AppError::invalid_state(format!(
                    "Inbox message '{trid}' was deleted"
                )));
            }
        }
        let record = self
            .repo
            .upsert(trid, &payload, published_at, Utc::now())
            .await?;
        debug!(trid, "Inbox message stored");
        Ok(record)
    }

    /// Change the status of a message.
    ///
    /// A request that ranks at or below the current status leaves it in
    /// place. Any change to a Deleted message fails with InvalidState.
    pub async fn set_status(&self, trid: &str, status: InboxStatus) -> AppResult<InboxRecord> {
        let _guard = self.lock(trid).await;
        let mut record = self.find_existing(trid).await?;

        match InboxStatus::resolve(record.status, status) {
            StatusUpdate::Forbidden => Err(AppError::invalid_state(format!(
                "Inbox message '{trid}' is deleted; cannot mark {status}"
            ))),
            StatusUpdate::Keep => Ok(record),
            StatusUpdate::Apply => {
                let now = Utc::now();
                self.repo.update_status(trid, status, now).await?;
                debug!(trid, status = %status, "Inbox status changed");
                record.status = Some(status);
                record.updated_at = now;
                Ok(record)
            }
        }
    }

    /// Persist the local path of a downloaded media file into the payload,
    /// at the top-level media or at carousel card `carousel_index`.
    pub async fn update_payload_media_path(
        &self,
        trid: &str,
        path: &str,
        carousel_index: Option<usize>,
    ) -> AppResult<InboxRecord> {
        let _guard = self.lock(trid).await;
        self.update_media_path_locked(trid, MediaSlot::from_index(carousel_index), path)
            .await
    }

    async fn update_media_path_locked(
        &self,
        trid: &str,
        slot: MediaSlot,
        path: &str,
    ) -> AppResult<InboxRecord> {
        let mut record = self.find_existing(trid).await?;
        if record.is_deleted() {
            return Err(AppError::invalid_state(format!(
                "Inbox message '{trid}' is deleted"
            )));
        }
        record.payload.set_local_path(slot, path)?;

        let now = Utc::now();
        self.repo.update_payload(trid, &record.payload, now).await?;
        record.updated_at = now;
        debug!(trid, slot = %slot, path, "Media path persisted");
        Ok(record)
    }

    /// Whether a download for `key` of `trid` is running.
    pub fn is_download_in_progress(&self, trid: &str, key: &str) -> bool {
        self.progress.is_active(trid, key)
    }

    /// Set or clear the download flag for `key` of `trid`. Clearing removes
    /// the key. Returns whether the flag changed.
    pub async fn set_download_in_progress(&self, trid: &str, key: &str, in_progress: bool) -> bool {
        let _guard = self.lock(trid).await;
        self.set_flag_locked(trid, key, in_progress)
    }

    fn set_flag_locked(&self, trid: &str, key: &str, in_progress: bool) -> bool {
        if in_progress {
            self.progress.start(trid, key)
        } else {
            self.progress.finish(trid, key)
        }
    }

    /// Persist a finished download and clear its flag in one critical
    /// section. The flag is cleared even when persisting fails.
    pub async fn complete_download(
        &self,
        trid: &str,
        slot: MediaSlot,
        path: &str,
    ) -> AppResult<InboxRecord> {
        let _guard = self.lock(trid).await;
        let result = self.update_media_path_locked(trid, slot, path).await;
        self.set_flag_locked(trid, &slot.key(), false);
        result
    }

    /// A single message with its download progress.
    pub async fn get(&self, trid: &str) -> AppResult<Option<InboxMessage>> {
        Ok(self.repo.find(trid).await?.map(|record| self.view(record)))
    }

    /// Messages passing `filter`, newest publish time first.
    pub async fn query(&self, filter: InboxFilter) -> AppResult<Vec<InboxMessage>> {
        let records = self.repo.query(filter).await?;
        Ok(records.into_iter().map(|record| self.view(record)).collect())
    }

    /// Number of unread messages (the badge count).
    pub async fn unread_count(&self) -> AppResult<i64> {
        self.repo.count(InboxFilter::UnreadOnly).await
    }

    /// Delete messages published before `older_than`, optionally only those
    /// in `status`.
    pub async fn purge(
        &self,
        older_than: DateTime<Utc>,
        status: Option<InboxStatus>,
    ) -> AppResult<u64> {
        let removed = self.repo.purge(older_than, status).await?;
        if removed > 0 {
            debug!(removed, older_than = %older_than, "Purged inbox messages");
        }
        Ok(removed)
    }

    fn view(&self, record: InboxRecord) -> InboxMessage {
        let media_download_in_progress = self.progress.snapshot(&record.trid);
        InboxMessage {
            record,
            media_download_in_progress,
        }
    }
}

/// Holds the per-`trid` lock and drops the map entry once no other task
/// holds or waits on it.
struct TridGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    trid: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TridGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold a clone, so a count of one is the map's own reference.
        self.locks
            .remove_if(&self.trid, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestDb;
    use beacon_core::error::ErrorKind;
    use beacon_entity::inbox::{CarouselItem, MediaReference};
    use chrono::Duration;

    fn payload(title: &str) -> NotificationPayload {
        NotificationPayload {
            title: title.into(),
            ..Default::default()
        }
    }

    fn carousel(cards: usize) -> NotificationPayload {
        NotificationPayload {
            title: "carousel".into(),
            media: Some(MediaReference::image("https://cdn/main.png")),
            carousel: (0..cards)
                .map(|i| CarouselItem {
                    media: Some(MediaReference::image(format!("https://cdn/{i}.png"))),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_trid() {
        let db = TestDb::new().await;
        let inbox = db.inbox_store();
        let t1 = Utc::now() - Duration::hours(1);
        let t2 = Utc::now();

        inbox.upsert("trid-1", payload("A"), t1).await.unwrap();
        inbox.upsert("trid-1", payload("B"), t2).await.unwrap();

        let all = inbox.query(InboxFilter::All).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].record.payload.title, "B");
        assert_eq!(
            all[0].record.published_at.timestamp_millis(),
            t2.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_upsert_rejects_empty_trid() {
        let db = TestDb::new().await;
        let err = db
            .inbox_store()
            .upsert(" ", payload("A"), Utc::now())
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_deleted_is_terminal() {
        let db = TestDb::new().await;
        let inbox = db.inbox_store();
        inbox.upsert("t", carousel(1), Utc::now()).await.unwrap();
        inbox.set_status("t", InboxStatus::Deleted).await.unwrap();

        let err = inbox.set_status("t", InboxStatus::Read).await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidState));
        let err = inbox.upsert("t", payload("again"), Utc::now()).await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidState));
        let err = inbox
            .update_payload_media_path("t", "/x.png", None)
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::InvalidState));
    }

    #[tokio::test]
    async fn test_status_never_moves_backwards() {
        let db = TestDb::new().await;
        let inbox = db.inbox_store();
        inbox.upsert("t", payload("A"), Utc::now()).await.unwrap();
        inbox.set_status("t", InboxStatus::Read).await.unwrap();
        let kept = inbox.set_status("t", InboxStatus::Viewed).await.unwrap();
        assert_eq!(kept.status, Some(InboxStatus::Read));
    }

    #[tokio::test]
    async fn test_set_status_unknown_trid() {
        let db = TestDb::new().await;
        let err = db
            .inbox_store()
            .set_status("missing", InboxStatus::Viewed)
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_download_flag_is_removed_not_stored_false() {
        let db = TestDb::new().await;
        let inbox = db.inbox_store();
        inbox.upsert("t", payload("A"), Utc::now()).await.unwrap();

        assert!(inbox.set_download_in_progress("t", "media0", true).await);
        assert!(inbox.is_download_in_progress("t", "media0"));
        let view = inbox.get("t").await.unwrap().unwrap();
        assert_eq!(view.media_download_in_progress.get("media0"), Some(&true));

        inbox.set_download_in_progress("t", "media0", false).await;
        assert!(!inbox.is_download_in_progress("t", "media0"));
        let view = inbox.get("t").await.unwrap().unwrap();
        assert!(!view.media_download_in_progress.contains_key("media0"));
    }

    #[tokio::test]
    async fn test_media_path_update_targets_one_index() {
        let db = TestDb::new().await;
        let inbox = db.inbox_store();
        inbox.upsert("t", carousel(4), Utc::now()).await.unwrap();

        inbox
            .update_payload_media_path("t", "/local/path.mp4", Some(2))
            .await
            .unwrap();

        let record = inbox.get("t").await.unwrap().unwrap().record;
        for (i, card) in record.payload.carousel.iter().enumerate() {
            let local = card.media.as_ref().unwrap().local_path.as_deref();
            assert_eq!(local, (i == 2).then_some("/local/path.mp4"));
        }
        assert_eq!(record.payload.media.unwrap().local_path, None);

        let err = inbox
            .update_payload_media_path("t", "/x", Some(9))
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
        let err = inbox
            .update_payload_media_path("missing", "/x", None)
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_carousel_updates_do_not_lose_writes() {
        let db = TestDb::new().await;
        let inbox = db.inbox_store();
        let cards = 8;
        inbox.upsert("t", carousel(cards), Utc::now()).await.unwrap();

        let tasks: Vec<_> = (0..cards)
            .map(|i| {
                let inbox = inbox.clone();
                tokio::spawn(async move {
                    inbox
                        .update_payload_media_path("t", &format!("/media/{i}.png"), Some(i))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let record = inbox.get("t").await.unwrap().unwrap().record;
        for (i, card) in record.payload.carousel.iter().enumerate() {
            let expected = format!("/media/{i}.png");
            assert_eq!(
                card.media.as_ref().unwrap().local_path.as_deref(),
                Some(expected.as_str())
            );
        }
    }

    #[tokio::test]
    async fn test_unread_query_order_and_count() {
        let db = TestDb::new().await;
        let inbox = db.inbox_store();
        let now = Utc::now();
        inbox.upsert("old", payload("o"), now - Duration::days(2)).await.unwrap();
        inbox.upsert("new", payload("n"), now).await.unwrap();
        inbox.upsert("mid", payload("m"), now - Duration::days(1)).await.unwrap();
        inbox.upsert("read", payload("r"), now).await.unwrap();
        inbox.set_status("read", InboxStatus::Read).await.unwrap();
        inbox.set_status("mid", InboxStatus::Viewed).await.unwrap();

        let unread: Vec<_> = inbox
            .query(InboxFilter::UnreadOnly)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.record.trid)
            .collect();
        assert_eq!(unread, ["new", "mid", "old"]);
        assert_eq!(inbox.unread_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_complete_download_clears_flag_on_failure() {
        let db = TestDb::new().await;
        let inbox = db.inbox_store();
        inbox.upsert("t", payload("no media"), Utc::now()).await.unwrap();
        inbox.set_download_in_progress("t", "media", true).await;

        let err = inbox
            .complete_download("t", MediaSlot::Main, "/x.png")
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
        assert!(!inbox.is_download_in_progress("t", "media"));
    }

    #[tokio::test]
    async fn test_idle_locks_are_released() {
        let db = TestDb::new().await;
        let inbox = db.inbox_store();
        inbox.upsert("trid-1", payload("A"), Utc::now()).await.unwrap();
        inbox
            .set_status("trid-1", InboxStatus::Read)
            .await
            .unwrap();
        inbox.set_download_in_progress("trid-1", "media", true).await;
        assert!(inbox.set_status("missing", InboxStatus::Read).await.is_err());
        assert_eq!(inbox.lock_count(), 0);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let inbox = inbox.clone();
                tokio::spawn(async move {
                    let trid = format!("trid-{}", i % 4);
                    inbox.upsert(&trid, payload("B"), Utc::now()).await.unwrap();
                    inbox.set_status(&trid, InboxStatus::Read).await.unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(inbox.lock_count(), 0);
        assert_eq!(inbox.query(InboxFilter::All).await.unwrap().len(), 4);
    }
}
