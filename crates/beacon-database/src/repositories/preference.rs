//! Key/value preference repository implementation.

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::result::AppResult;
use beacon_core::types::to_millis;
use beacon_entity::event::EventRecord;

use super::event::insert_record;

/// One write applied by [`PreferenceRepository::write_with_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceChange<'a> {
    /// Insert or overwrite `key` with a value.
    Set(&'a str, &'a str),
    /// Remove `key`.
    Delete(&'a str),
}

/// Repository for the persisted preference set.
#[derive(Debug, Clone)]
pub struct PreferenceRepository {
    pool: SqlitePool,
}

impl PreferenceRepository {
    /// Create a new preference repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read a single value.
    pub async fn get(&self, key: &str) -> AppResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Failed to read preference", e))
    }

    /// Insert or overwrite a value.
    pub async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        upsert(&self.pool, key, value).await
    }

    /// Remove a value. Returns `false` if it was not set.
    pub async fn delete(&self, key: &str) -> AppResult<bool> {
        remove(&self.pool, key).await
    }

    /// Apply `changes` and insert `event` in a single transaction.
    ///
    /// Either every write lands or none does.
    pub async fn write_with_event(
        &self,
        changes: &[PreferenceChange<'_>],
        event: Option<&EventRecord>,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Persistence, "Failed to begin transaction", e)
        })?;
        for change in changes {
            match *change {
                PreferenceChange::Set(key, value) => upsert(&mut *tx, key, value).await?,
                PreferenceChange::Delete(key) => {
                    remove(&mut *tx, key).await?;
                }
            }
        }
        if let Some(record) = event {
            insert_record(&mut *tx, record).await?;
        }
        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Persistence, "Failed to commit transaction", e)
        })
    }

    /// Every stored key/value pair, sorted by key.
    pub async fn all(&self) -> AppResult<Vec<(String, String)>> {
        sqlx::query_as::<_, (String, String)>("SELECT key, value FROM preferences ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Failed to list preferences", e))
    }
}

async fn upsert<'e, E>(executor: E, key: &str, value: &str) -> AppResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO preferences (key, value, updated_at_ms) VALUES (?, ?, ?) \
         ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at_ms = excluded.updated_at_ms",
    )
    .bind(key)
    .bind(value)
    .bind(to_millis(Utc::now()))
    .execute(executor)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Failed to write preference", e))?;
    Ok(())
}

async fn remove<'e, E>(executor: E, key: &str) -> AppResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM preferences WHERE key = ?")
        .bind(key)
        .execute(executor)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Persistence, "Failed to delete preference", e))?;
    Ok(result.rows_affected() == 1)
}
