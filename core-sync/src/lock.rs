//! # Sync Lock Manager
//!
//! Per-user mutual exclusion for sync runs, backed by a uniqueness
//! constraint on the `sync_locks` table.
//!
//! ## Overview
//!
//! Sync triggers can arrive concurrently from several surfaces (manual
//! action, scheduled job, extension call). The storage layer arbitrates:
//! only one `INSERT` can win the `user_id` unique constraint, so two racing
//! acquires cannot both succeed. Crash recovery is lazy — a lock whose
//! expiry has passed is deleted by the next acquisition attempt, never by a
//! background sweeper. Cancellation is a cooperative flag on the lock row,
//! polled by the running orchestrator at channel boundaries.

use crate::Result;
use sqlx::{FromRow, SqlitePool};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Unique identifier for one lock acquisition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockId(String);

impl LockId {
    fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A lock row as stored
#[derive(Debug, Clone, FromRow)]
pub struct SyncLock {
    pub id: String,
    pub user_id: String,
    pub acquired_at: i64,
    pub expires_at: i64,
    pub cancel_requested: bool,
}

impl SyncLock {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Per-user distributed lock manager
pub struct LockManager {
    pool: SqlitePool,
    timeout: Duration,
}

impl LockManager {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Try to acquire the user's lock.
    ///
    /// Returns `None` when a live lock already exists — callers must treat
    /// that as "busy, retry later" and never block waiting.
    pub async fn acquire(&self, user_id: &str) -> Result<Option<LockId>> {
        let now = Self::now();

        // Lazy crash recovery: an expired lock is harmless, delete it.
        sqlx::query("DELETE FROM sync_locks WHERE user_id = ? AND expires_at <= ?")
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        let lock_id = LockId::new();
        let expires_at = now + self.timeout.as_secs() as i64;

        let insert = sqlx::query(
            r#"
            INSERT INTO sync_locks (id, user_id, acquired_at, expires_at, cancel_requested)
            VALUES (?, ?, ?, ?, 0)
            "#,
        )
        .bind(lock_id.as_str())
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await;

        match insert {
            Ok(_) => {
                debug!(user_id, lock_id = %lock_id, "Acquired sync lock");
                Ok(Some(lock_id))
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!(user_id, "Sync lock busy");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Release the user's lock.
    ///
    /// When a lock id is given, only that acquisition's row is deleted, so a
    /// slow superseded holder cannot release a newer lock it does not own.
    pub async fn release(&self, user_id: &str, lock_id: Option<&LockId>) -> Result<bool> {
        let result = match lock_id {
            Some(id) => {
                sqlx::query("DELETE FROM sync_locks WHERE user_id = ? AND id = ?")
                    .bind(user_id)
                    .bind(id.as_str())
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM sync_locks WHERE user_id = ?")
                    .bind(user_id)
                    .execute(&self.pool)
                    .await?
            }
        };

        let released = result.rows_affected() > 0;
        debug!(user_id, released, "Released sync lock");
        Ok(released)
    }

    /// Heartbeat: push the expiry forward for a long-running operation
    pub async fn extend(&self, user_id: &str, lock_id: &LockId) -> Result<bool> {
        let expires_at = Self::now() + self.timeout.as_secs() as i64;
        let result = sqlx::query("UPDATE sync_locks SET expires_at = ? WHERE user_id = ? AND id = ?")
            .bind(expires_at)
            .bind(user_id)
            .bind(lock_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the cooperative cancellation flag. Does not stop the run.
    pub async fn request_cancellation(&self, user_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE sync_locks SET cancel_requested = 1 WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Poll the cancellation flag.
    ///
    /// Fails safe: a missing lock row or an unreadable flag reads as
    /// cancelled, so a loop that lost its lock cannot keep running forever.
    pub async fn is_cancelled(&self, user_id: &str, lock_id: &LockId) -> bool {
        let row: std::result::Result<Option<(bool,)>, sqlx::Error> =
            sqlx::query_as("SELECT cancel_requested FROM sync_locks WHERE user_id = ? AND id = ?")
                .bind(user_id)
                .bind(lock_id.as_str())
                .fetch_optional(&self.pool)
                .await;

        match row {
            Ok(Some((flag,))) => flag,
            Ok(None) => true,
            Err(e) => {
                warn!(user_id, error = %e, "Cancellation poll failed, treating as cancelled");
                true
            }
        }
    }

    /// Inspect the user's lock row, expired or not (operator escape hatch)
    pub async fn inspect(&self, user_id: &str) -> Result<Option<SyncLock>> {
        let lock = sqlx::query_as::<_, SyncLock>("SELECT * FROM sync_locks WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lock)
    }

    /// Whether a live (non-expired) lock exists for the user
    pub async fn is_held(&self, user_id: &str) -> Result<bool> {
        let now = Self::now();
        Ok(self
            .inspect(user_id)
            .await?
            .map(|lock| !lock.is_expired(now))
            .unwrap_or(false))
    }

    /// Forcibly clear the user's lock regardless of holder
    pub async fn clear(&self, user_id: &str) -> Result<bool> {
        self.release(user_id, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_store::create_test_pool;

    fn manager(pool: SqlitePool) -> LockManager {
        LockManager::new(pool, Duration::from_secs(1800))
    }

    #[tokio::test]
    async fn test_second_acquire_is_denied() {
        let pool = create_test_pool().await.unwrap();
        let locks = manager(pool);

        let first = locks.acquire("user-a").await.unwrap();
        assert!(first.is_some());
        assert!(locks.acquire("user-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_different_users_do_not_contend() {
        let pool = create_test_pool().await.unwrap();
        let locks = manager(pool);

        assert!(locks.acquire("user-a").await.unwrap().is_some());
        assert!(locks.acquire("user-b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_lock_does_not_block() {
        let pool = create_test_pool().await.unwrap();
        let locks = manager(pool.clone());

        locks.acquire("user-a").await.unwrap().unwrap();
        assert!(locks.acquire("user-a").await.unwrap().is_none());

        sqlx::query("UPDATE sync_locks SET expires_at = 1 WHERE user_id = 'user-a'")
            .execute(&pool)
            .await
            .unwrap();

        assert!(locks.acquire("user-a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_release_with_stale_id_keeps_new_lock() {
        let pool = create_test_pool().await.unwrap();
        let locks = manager(pool.clone());

        let old = locks.acquire("user-a").await.unwrap().unwrap();
        sqlx::query("UPDATE sync_locks SET expires_at = 1 WHERE user_id = 'user-a'")
            .execute(&pool)
            .await
            .unwrap();
        let new = locks.acquire("user-a").await.unwrap().unwrap();

        // The superseded holder must not release the new lock.
        assert!(!locks.release("user-a", Some(&old)).await.unwrap());
        assert!(locks.is_held("user-a").await.unwrap());
        assert!(locks.release("user-a", Some(&new)).await.unwrap());
    }

    #[tokio::test]
    async fn test_extend_pushes_expiry() {
        let pool = create_test_pool().await.unwrap();
        let locks = manager(pool.clone());

        let lock_id = locks.acquire("user-a").await.unwrap().unwrap();
        sqlx::query("UPDATE sync_locks SET expires_at = 100 WHERE user_id = 'user-a'")
            .execute(&pool)
            .await
            .unwrap();

        assert!(locks.extend("user-a", &lock_id).await.unwrap());
        let lock = locks.inspect("user-a").await.unwrap().unwrap();
        assert!(!lock.is_expired(chrono::Utc::now().timestamp()));
    }

    #[tokio::test]
    async fn test_cancellation_flag_round_trip() {
        let pool = create_test_pool().await.unwrap();
        let locks = manager(pool);

        let lock_id = locks.acquire("user-a").await.unwrap().unwrap();
        assert!(!locks.is_cancelled("user-a", &lock_id).await);

        assert!(locks.request_cancellation("user-a").await.unwrap());
        assert!(locks.is_cancelled("user-a", &lock_id).await);
    }

    #[tokio::test]
    async fn test_missing_lock_reads_as_cancelled() {
        let pool = create_test_pool().await.unwrap();
        let locks = manager(pool);

        let lock_id = locks.acquire("user-a").await.unwrap().unwrap();
        locks.clear("user-a").await.unwrap();
        assert!(locks.is_cancelled("user-a", &lock_id).await);
    }

    #[tokio::test]
    async fn test_cancellation_without_lock_reports_false() {
        let pool = create_test_pool().await.unwrap();
        let locks = manager(pool);
        assert!(!locks.request_cancellation("user-a").await.unwrap());
    }
}
