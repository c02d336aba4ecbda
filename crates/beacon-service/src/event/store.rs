//! Durable queue of outbound events.

use chrono::{DateTime, Utc};
use tracing::debug;

use beacon_core::error::AppError;
use beacon_core::result::AppResult;
use beacon_core::types::EventId;
use beacon_database::repositories::EventRepository;
use beacon_entity::event::{EventRecord, EventStatus, NewEvent, RetryMetadata};

/// Event record store.
///
/// Every mutation is written through to SQLite before the call returns.
/// Status changes are compare-and-set against the status the change was
/// validated for, so concurrent writers never skip a state.
#[derive(Debug, Clone)]
pub struct EventStore {
    repo: EventRepository,
}

impl EventStore {
    /// Creates a new event store.
    pub fn new(repo: EventRepository) -> Self {
        Self { repo }
    }

    /// Validate and persist a new Pending record.
    pub async fn enqueue(&self, event: NewEvent) -> AppResult<EventRecord> {
        let record = Self::prepare(event)?;
        self.repo.insert(&record).await?;
        log_enqueued(&record);
        Ok(record)
    }

    /// Validate `event` and build its Pending record without persisting it.
    ///
    /// For callers that write the record together with other state.
    pub fn prepare(event: NewEvent) -> AppResult<EventRecord> {
        event.validate()?;

        let now = Utc::now();
        Ok(EventRecord {
            id: EventId::new(),
            event_type: event.event_type,
            event_name: event.event_name,
            status: EventStatus::Pending,
            payload: event.payload,
            user_identity: event.user_identity,
            attempts: 0,
            next_attempt_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch a record, failing with NotFound if it does not exist.
    pub async fn get(&self, id: EventId) -> AppResult<EventRecord> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Event {id} not found")))
    }

    /// Move a record to `new_status`.
    ///
    /// Entering InProgress counts a send attempt; returning to Pending
    /// clears the backoff deadline. Other metadata is kept.
    pub async fn mark_status(&self, id: EventId, new_status: EventStatus) -> AppResult<EventRecord> {
        let current = self.get(id).await?;
        let mut retry = RetryMetadata::of(&current);
        match new_status {
            EventStatus::InProgress => retry.attempts = current.attempts.saturating_add(1),
            EventStatus::Pending => retry.next_attempt_at = None,
            EventStatus::Success | EventStatus::Failed => {}
        }
        self.apply(current, new_status, retry).await
    }

    /// Move a record to `new_status`, replacing its retry metadata.
    pub async fn transition(
        &self,
        id: EventId,
        new_status: EventStatus,
        retry: RetryMetadata,
    ) -> AppResult<EventRecord> {
        let current = self.get(id).await?;
        self.apply(current, new_status, retry).await
    }

    async fn apply(
        &self,
        current: EventRecord,
        new_status: EventStatus,
        retry: RetryMetadata,
    ) -> AppResult<EventRecord> {
        if !current.status.can_transition_to(new_status) {
            return Err(AppError::invalid_transition(format!(
                "Event {} cannot move from {} to {}",
                current.id, current.status, new_status
            )));
        }

        let now = Utc::now();
        let swapped = self
            .repo
            .update_status(current.id, current.status, new_status, &retry, now)
            .await?;
        if !swapped {
            let latest = self.get(current.id).await?;
            return Err(AppError::invalid_transition(format!(
                "Event {} moved to {} concurrently; cannot move to {}",
                current.id, latest.status, new_status
            )));
        }

        debug!(event_id = %current.id, from = %current.status, to = %new_status, "Event status changed");
        Ok(EventRecord {
            status: new_status,
            attempts: retry.attempts,
            next_attempt_at: retry.next_attempt_at,
            last_error: retry.last_error,
            updated_at: now,
            ..current
        })
    }

    /// Oldest-first Pending records and Failed records whose backoff has
    /// elapsed, up to `max_count`. Does not change any status.
    pub async fn pending_batch(&self, max_count: u32) -> AppResult<Vec<EventRecord>> {
        if max_count == 0 {
            return Ok(Vec::new());
        }
        self.repo.pending_batch(max_count, Utc::now()).await
    }

    /// Records stranded in InProgress, oldest first.
    pub async fn in_flight(&self) -> AppResult<Vec<EventRecord>> {
        self.with_status(EventStatus::InProgress).await
    }

    /// All records in `status`, oldest first.
    pub async fn with_status(&self, status: EventStatus) -> AppResult<Vec<EventRecord>> {
        self.repo.find_by_status(status).await
    }

    /// Delete records created before `older_than` in one of `statuses`.
    pub async fn purge(&self, older_than: DateTime<Utc>, statuses: &[EventStatus]) -> AppResult<u64> {
        let removed = self.repo.purge(older_than, statuses).await?;
        if removed > 0 {
            debug!(removed, older_than = %older_than, "Purged event records");
        }
        Ok(removed)
    }

    /// Delete a single record.
    pub async fn remove(&self, id: EventId) -> AppResult<bool> {
        self.repo.delete(id).await
    }

    /// Number of records per status.
    pub async fn count_by_status(&self) -> AppResult<Vec<(EventStatus, i64)>> {
        self.repo.count_by_status().await
    }

    /// Most recent records, newest first.
    pub async fn recent(&self, limit: u32) -> AppResult<Vec<EventRecord>> {
        self.repo.recent(limit).await
    }
}

pub(crate) fn log_enqueued(record: &EventRecord) {
    debug!(
        event_id = %record.id,
        event_name = %record.event_name,
        event_type = %record.event_type,
        "Event enqueued"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestDb;
    use beacon_core::error::ErrorKind;
    use beacon_entity::event::{EventCode, EventPayload};
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_enqueue_creates_unique_pending_records() {
        let db = TestDb::new().await;
        let store = db.event_store();

        let mut ids = HashSet::new();
        for i in 0..20 {
            let record = store
                .enqueue(NewEvent::custom(format!("event_{i}"), EventPayload::new()))
                .await
                .unwrap();
            assert_eq!(record.status, EventStatus::Pending);
            assert!(ids.insert(record.id));
        }
        assert_eq!(store.pending_batch(100).await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_invalid() {
        let db = TestDb::new().await;
        let store = db.event_store();
        let err = store
            .enqueue(NewEvent::custom("", EventPayload::new()))
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Validation));
        assert!(store.pending_batch(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_state_machine_enforced() {
        let db = TestDb::new().await;
        let store = db.event_store();
        let record = store
            .enqueue(NewEvent::catalog(EventCode::AppLaunched, EventPayload::new()))
            .await
            .unwrap();

        let err = store.mark_status(record.id, EventStatus::Success).await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidTransition));

        let claimed = store.mark_status(record.id, EventStatus::InProgress).await.unwrap();
        assert_eq!(claimed.attempts, 1);
        let done = store.mark_status(record.id, EventStatus::Success).await.unwrap();
        assert_eq!(done.status, EventStatus::Success);

        let err = store.mark_status(record.id, EventStatus::Pending).await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidTransition));
        assert_eq!(store.get(record.id).await.unwrap().status, EventStatus::Success);
    }

    #[tokio::test]
    async fn test_failed_can_be_retried() {
        let db = TestDb::new().await;
        let store = db.event_store();
        let record = store
            .enqueue(NewEvent::custom("retry_me", EventPayload::new()))
            .await
            .unwrap();

        store.mark_status(record.id, EventStatus::InProgress).await.unwrap();
        let failed = store
            .transition(
                record.id,
                EventStatus::Failed,
                RetryMetadata {
                    attempts: 1,
                    next_attempt_at: Some(Utc::now() + chrono::Duration::hours(1)),
                    last_error: Some("timeout".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(failed.last_error.as_deref(), Some("timeout"));
        assert!(store.pending_batch(10).await.unwrap().is_empty());

        let pending = store.mark_status(record.id, EventStatus::Pending).await.unwrap();
        assert_eq!(pending.next_attempt_at, None);
        assert_eq!(pending.attempts, 1);
        assert_eq!(store.pending_batch(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_record() {
        let db = TestDb::new().await;
        let store = db.event_store();
        let err = store
            .mark_status(EventId::new(), EventStatus::InProgress)
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_concurrent_claims_only_one_wins() {
        let db = TestDb::new().await;
        let store = db.event_store();
        let record = store
            .enqueue(NewEvent::custom("contended", EventPayload::new()))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            store.mark_status(record.id, EventStatus::InProgress),
            store.mark_status(record.id, EventStatus::InProgress)
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(store.get(record.id).await.unwrap().attempts, 1);
    }
}
