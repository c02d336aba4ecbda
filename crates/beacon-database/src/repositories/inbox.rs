//! Inbox message repository implementation.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::result::AppResult;
use beacon_core::types::{from_millis, to_millis};
use beacon_entity::inbox::{InboxFilter, InboxRecord, InboxStatus, NotificationPayload};

#[derive(Debug, FromRow)]
struct InboxRow {
    trid: String,
    status: Option<String>,
    published_at_ms: i64,
    payload: String,
    created_at_ms: i64,
    updated_at_ms: i64,
}

impl TryFrom<InboxRow> for InboxRecord {
    type Error = AppError;

    fn try_from(row: InboxRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .as_deref()
            .map(InboxStatus::parse)
            .transpose()
            .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Corrupt inbox row", e))?;
        Ok(Self {
            trid: row.trid,
            status,
            published_at: from_millis(row.published_at_ms),
            payload: serde_json::from_str(&row.payload)?,
            created_at: from_millis(row.created_at_ms),
            updated_at: from_millis(row.updated_at_ms),
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT trid, status, published_at_ms, payload, created_at_ms, updated_at_ms FROM inbox_records";

/// Append the SQL condition equivalent to [`InboxFilter::matches`].
fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: InboxFilter) {
    match filter {
        InboxFilter::All => {}
        InboxFilter::InboxOnly => {
            builder.push(" WHERE (status IS NULL OR status <> 'deleted')");
        }
        InboxFilter::ReadOnly => {
            builder.push(" WHERE status = 'read'");
        }
        InboxFilter::UnreadOnly => {
            builder.push(" WHERE (status IS NULL OR status NOT IN ('read', 'deleted'))");
        }
    }
}

/// Repository for app inbox messages.
#[derive(Debug, Clone)]
pub struct InboxRepository {
    pool: SqlitePool,
}

impl InboxRepository {
    /// Create a new inbox repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a message, or replace the payload and publish time of an
    /// existing one. The status and creation time of an existing row are
    /// kept.
    pub async fn upsert(
        &self,
        trid: &str,
        payload: &NotificationPayload,
        published_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<InboxRecord> {
        let payload_json = serde_json::to_string(payload)?;
        let row = sqlx::query_as::<_, InboxRow>(
            "INSERT INTO inbox_records (trid, status, published_at_ms, payload, created_at_ms, updated_at_ms) \
             VALUES (?, NULL, ?, ?, ?, ?) \
             ON CONFLICT (trid) DO UPDATE SET \
                published_at_ms = excluded.published_at_ms, \
                payload = excluded.payload, \
                updated_at_ms = excluded.updated_at_ms \
             RETURNING trid, status, published_at_ms, payload, created_at_ms, updated_at_ms",
        )
        .bind(trid)
        .bind(to_millis(published_at))
        .bind(payload_json)
        .bind(to_millis(now))
        .bind(to_millis(now))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Failed to upsert inbox message", e))?;
        InboxRecord::try_from(row)
    }

    /// Find a message by transaction ID.
    pub async fn find(&self, trid: &str) -> AppResult<Option<InboxRecord>> {
        let row = sqlx::query_as::<_, InboxRow>(&format!("{SELECT_COLUMNS} WHERE trid = ?"))
            .bind(trid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Persistence, "Failed to find inbox message", e)
            })?;
        row.map(InboxRecord::try_from).transpose()
    }

    /// Overwrite the status of a message. Returns `false` if it does not exist.
    pub async fn update_status(
        &self,
        trid: &str,
        status: InboxStatus,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE inbox_records SET status = ?, updated_at_ms = ? WHERE trid = ?",
        )
        .bind(status.as_str())
        .bind(to_millis(now))
        .bind(trid)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Persistence, "Failed to update inbox status", e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    /// Overwrite the payload of a message. Returns `false` if it does not exist.
    pub async fn update_payload(
        &self,
        trid: &str,
        payload: &NotificationPayload,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let payload_json = serde_json::to_string(payload)?;
        let result = sqlx::query(
            "UPDATE inbox_records SET payload = ?, updated_at_ms = ? WHERE trid = ?",
        )
        .bind(payload_json)
        .bind(to_millis(now))
        .bind(trid)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Persistence, "Failed to update inbox payload", e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    /// Messages passing `filter`, newest publish time first.
    pub async fn query(&self, filter: InboxFilter) -> AppResult<Vec<InboxRecord>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY published_at_ms DESC, trid ASC");

        let rows = builder
            .build_query_as::<InboxRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Persistence, "Failed to query inbox", e)
            })?;
        rows.into_iter().map(InboxRecord::try_from).collect()
    }

    /// Number of messages passing `filter`.
    pub async fn count(&self, filter: InboxFilter) -> AppResult<i64> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM inbox_records");
        push_filter(&mut builder, filter);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Failed to count inbox", e))
    }

    /// Delete messages published before `older_than`. With `status` set,
    /// only messages in that status are removed.
    pub async fn purge(
        &self,
        older_than: DateTime<Utc>,
        status: Option<InboxStatus>,
    ) -> AppResult<u64> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM inbox_records WHERE published_at_ms < ");
        builder.push_bind(to_millis(older_than));
        if let Some(status) = status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Failed to purge inbox", e))?;
        Ok(result.rows_affected())
    }
}
