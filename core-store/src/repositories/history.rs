//! # Sync History Repository
//!
//! Append-only audit log of finished sync runs, one row per run.

use crate::models::SyncHistoryEntry;
use crate::{Result, StoreError};
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

/// A finished run to record.
#[derive(Debug, Clone)]
pub struct NewSyncHistoryEntry {
    pub user_id: String,
    pub sync_type: String,
    pub success: bool,
    pub channels_processed: i64,
    pub channels_failed: i64,
    pub videos_added: i64,
    pub quota_units_used: i64,
    pub started_at: i64,
    pub finished_at: i64,
}

#[async_trait]
pub trait SyncHistoryRepository: Send + Sync {
    /// Record a finished run
    async fn record(&self, entry: NewSyncHistoryEntry) -> Result<SyncHistoryEntry>;

    /// List a user's runs, newest first
    async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<SyncHistoryEntry>>;

    /// The most recent run for a user, if any
    async fn last_for_user(&self, user_id: &str) -> Result<Option<SyncHistoryEntry>>;
}

/// SQLite implementation of [`SyncHistoryRepository`]
pub struct SqliteSyncHistoryRepository {
    pool: Pool<Sqlite>,
}

impl SqliteSyncHistoryRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncHistoryRepository for SqliteSyncHistoryRepository {
    async fn record(&self, entry: NewSyncHistoryEntry) -> Result<SyncHistoryEntry> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO sync_history (
                id, user_id, sync_type, success, channels_processed, channels_failed,
                videos_added, quota_units_used, started_at, finished_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&entry.user_id)
        .bind(&entry.sync_type)
        .bind(entry.success)
        .bind(entry.channels_processed)
        .bind(entry.channels_failed)
        .bind(entry.videos_added)
        .bind(entry.quota_units_used)
        .bind(entry.started_at)
        .bind(entry.finished_at)
        .execute(&self.pool)
        .await?;

        let stored = sqlx::query_as::<_, SyncHistoryEntry>("SELECT * FROM sync_history WHERE id = ?")
            .bind(&id)
            .fetch_optional(&self.pool)
            .await?;

        stored.ok_or_else(|| StoreError::NotFound {
            entity_type: "sync_history".to_string(),
            id,
        })
    }

    async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<SyncHistoryEntry>> {
        let entries = sqlx::query_as::<_, SyncHistoryEntry>(
            r#"
            SELECT * FROM sync_history
            WHERE user_id = ?
            ORDER BY started_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn last_for_user(&self, user_id: &str) -> Result<Option<SyncHistoryEntry>> {
        let entry = sqlx::query_as::<_, SyncHistoryEntry>(
            r#"
            SELECT * FROM sync_history
            WHERE user_id = ?
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }
}
