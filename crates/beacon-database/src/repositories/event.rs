//! Event queue repository implementation.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::result::AppResult;
use beacon_core::types::{EventId, from_millis, to_millis};
use beacon_entity::event::{EventName, EventRecord, EventStatus, EventType, RetryMetadata};

#[derive(Debug, FromRow)]
struct EventRow {
    id: EventId,
    event_type: String,
    event_name: String,
    status: String,
    payload: String,
    user_identity: Option<String>,
    attempts: i64,
    next_attempt_at_ms: Option<i64>,
    last_error: Option<String>,
    created_at_ms: i64,
    updated_at_ms: i64,
}

impl TryFrom<EventRow> for EventRecord {
    type Error = AppError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let event_type = EventType::parse(&row.event_type)
            .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Corrupt event row", e))?;
        let status = EventStatus::parse(&row.status)
            .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Corrupt event row", e))?;
        Ok(Self {
            id: row.id,
            event_type,
            event_name: EventName::from_parts(event_type, &row.event_name),
            status,
            payload: serde_json::from_str(&row.payload)?,
            user_identity: row.user_identity,
            attempts: u32::try_from(row.attempts).unwrap_or(0),
            next_attempt_at: row.next_attempt_at_ms.map(from_millis),
            last_error: row.last_error,
            created_at: from_millis(row.created_at_ms),
            updated_at: from_millis(row.updated_at_ms),
        })
    }
}

fn into_records(rows: Vec<EventRow>) -> AppResult<Vec<EventRecord>> {
    rows.into_iter().map(EventRecord::try_from).collect()
}

const SELECT_COLUMNS: &str = "SELECT id, event_type, event_name, status, payload, user_identity, \
     attempts, next_attempt_at_ms, last_error, created_at_ms, updated_at_ms FROM event_records";

/// Insert `record` through `executor`, which may be a pool or an open
/// transaction.
pub(crate) async fn insert_record<'e, E>(executor: E, record: &EventRecord) -> AppResult<()>
where
    E: SqliteExecutor<'e>,
{
    let payload = serde_json::to_string(&record.payload)?;
    sqlx::query(
        "INSERT INTO event_records (id, event_type, event_name, status, payload, user_identity, \
         attempts, next_attempt_at_ms, last_error, created_at_ms, updated_at_ms) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(record.id)
    .bind(record.event_type.as_str())
    .bind(record.event_name.as_str())
    .bind(record.status.as_str())
    .bind(payload)
    .bind(&record.user_identity)
    .bind(i64::from(record.attempts))
    .bind(record.next_attempt_at.map(to_millis))
    .bind(&record.last_error)
    .bind(to_millis(record.created_at))
    .bind(to_millis(record.updated_at))
    .execute(executor)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Failed to insert event", e))?;
    Ok(())
}

/// Repository for the outbound event queue.
#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: SqlitePool,
}

impl EventRepository {
    /// Create a new event repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new record.
    pub async fn insert(&self, record: &EventRecord) -> AppResult<()> {
        insert_record(&self.pool, record).await
    }

    /// Find a record by ID.
    pub async fn find_by_id(&self, id: EventId) -> AppResult<Option<EventRecord>> {
        let row = sqlx::query_as::<_, EventRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Failed to find event", e))?;
        row.map(EventRecord::try_from).transpose()
    }

    /// Move a record from `expected` to `next`, writing its retry metadata.
    ///
    /// Compare-and-set on the current status: returns `false` when the
    /// record is missing or no longer in `expected`.
    pub async fn update_status(
        &self,
        id: EventId,
        expected: EventStatus,
        next: EventStatus,
        retry: &RetryMetadata,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE event_records SET status = ?, attempts = ?, next_attempt_at_ms = ?, \
             last_error = ?, updated_at_ms = ? WHERE id = ? AND status = ?",
        )
        .bind(next.as_str())
        .bind(i64::from(retry.attempts))
        .bind(retry.next_attempt_at.map(to_millis))
        .bind(&retry.last_error)
        .bind(to_millis(now))
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Persistence, "Failed to update event status", e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    /// Oldest-first Pending records plus Failed records whose backoff has
    /// elapsed at `now`.
    pub async fn pending_batch(&self, limit: u32, now: DateTime<Utc>) -> AppResult<Vec<EventRecord>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "{SELECT_COLUMNS} WHERE status = 'pending' \
             OR (status = 'failed' AND (next_attempt_at_ms IS NULL OR next_attempt_at_ms <= ?)) \
             ORDER BY seq ASC LIMIT ?"
        ))
        .bind(to_millis(now))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Persistence, "Failed to fetch pending events", e)
        })?;
        into_records(rows)
    }

    /// All records in `status`, oldest first.
    pub async fn find_by_status(&self, status: EventStatus) -> AppResult<Vec<EventRecord>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "{SELECT_COLUMNS} WHERE status = ? ORDER BY seq ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Persistence, "Failed to list events by status", e)
        })?;
        into_records(rows)
    }

    /// Most recent records, newest first.
    pub async fn recent(&self, limit: u32) -> AppResult<Vec<EventRecord>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY seq DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Failed to list events", e))?;
        into_records(rows)
    }

    /// Number of records per status.
    pub async fn count_by_status(&self) -> AppResult<Vec<(EventStatus, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM event_records GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Failed to count events", e))?;

        rows.into_iter()
            .map(|(status, count)| {
                EventStatus::parse(&status)
                    .map(|s| (s, count))
                    .map_err(|e| {
                        AppError::with_source(ErrorKind::Persistence, "Corrupt event row", e)
                    })
            })
            .collect()
    }

    /// Delete a record. Returns `false` if it did not exist.
    pub async fn delete(&self, id: EventId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM event_records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Persistence, "Failed to delete event", e)
            })?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete records created before `older_than` whose status is in
    /// `statuses`. Returns the number removed.
    pub async fn purge(&self, older_than: DateTime<Utc>, statuses: &[EventStatus]) -> AppResult<u64> {
        if statuses.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM event_records WHERE created_at_ms < ");
        builder.push_bind(to_millis(older_than));
        builder.push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in statuses {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(")");

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Failed to purge events", e))?;
        Ok(result.rows_affected())
    }
}
