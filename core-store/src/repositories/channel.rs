//! # Channel Repository
//!
//! Persistence for mirrored channels, including the health fields the sync
//! engine maintains. Upserts key on the provider's `external_id` so repeated
//! imports stay idempotent, and the failure counter is bumped with a single
//! statement so concurrent syncs observing the same broken channel cannot
//! lose increments.

use crate::models::{ActivityLevel, Channel, HealthStatus, NewChannel};
use crate::{Result, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait ChannelRepository: Send + Sync {
    /// Insert or update a channel from provider output. Health fields are
    /// never touched by the upsert.
    async fn upsert(&self, channel: &NewChannel) -> Result<Channel>;

    /// Get a channel by internal id
    async fn get(&self, id: &str) -> Result<Option<Channel>>;

    /// Get a channel by the provider's identifier
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Channel>>;

    /// List every channel a user is subscribed to
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Channel>>;

    /// List a user's degraded channels (anything other than healthy)
    async fn list_degraded_for_user(&self, user_id: &str) -> Result<Vec<Channel>>;

    /// List all channels with the given health status
    async fn list_by_health(&self, status: HealthStatus) -> Result<Vec<Channel>>;

    /// Store a resolved uploads playlist id
    async fn set_uploads_playlist(&self, id: &str, playlist_id: &str) -> Result<()>;

    /// Record a successful fetch: reset the failure counter and status
    async fn record_success(&self, id: &str) -> Result<()>;

    /// Record a failed fetch: atomically bump the counter, derive the new
    /// status, and return the updated row.
    async fn record_failure(&self, id: &str, reason: &str) -> Result<Channel>;

    /// Reset health on the given channels, returning how many were updated
    async fn reset_health(&self, ids: &[String]) -> Result<u64>;

    /// Store a recomputed activity level
    async fn set_activity_level(&self, id: &str, level: ActivityLevel) -> Result<()>;

    /// List every channel (maintenance jobs)
    async fn list_all(&self) -> Result<Vec<Channel>>;
}

/// SQLite implementation of [`ChannelRepository`]
pub struct SqliteChannelRepository {
    pool: Pool<Sqlite>,
}

impl SqliteChannelRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelRepository for SqliteChannelRepository {
    async fn upsert(&self, channel: &NewChannel) -> Result<Channel> {
        let now = Utc::now().timestamp();
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO channels (id, external_id, title, thumbnail_url, uploads_playlist_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO UPDATE SET
                title = excluded.title,
                thumbnail_url = excluded.thumbnail_url,
                uploads_playlist_id = COALESCE(excluded.uploads_playlist_id, uploads_playlist_id),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&channel.external_id)
        .bind(&channel.title)
        .bind(&channel.thumbnail_url)
        .bind(&channel.uploads_playlist_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_by_external_id(&channel.external_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity_type: "channel".to_string(),
                id: channel.external_id.clone(),
            })
    }

    async fn get(&self, id: &str) -> Result<Option<Channel>> {
        let channel = sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(channel)
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Channel>> {
        let channel = sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(channel)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Channel>> {
        let channels = sqlx::query_as::<_, Channel>(
            r#"
            SELECT c.* FROM channels c
            JOIN subscriptions s ON s.channel_id = c.id
            WHERE s.user_id = ?
            ORDER BY c.title COLLATE NOCASE
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(channels)
    }

    async fn list_degraded_for_user(&self, user_id: &str) -> Result<Vec<Channel>> {
        let channels = sqlx::query_as::<_, Channel>(
            r#"
            SELECT c.* FROM channels c
            JOIN subscriptions s ON s.channel_id = c.id
            WHERE s.user_id = ? AND c.health_status != 'healthy'
            ORDER BY c.consecutive_failures DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(channels)
    }

    async fn list_by_health(&self, status: HealthStatus) -> Result<Vec<Channel>> {
        let channels = sqlx::query_as::<_, Channel>(
            "SELECT * FROM channels WHERE health_status = ? ORDER BY last_failure_at ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(channels)
    }

    async fn set_uploads_playlist(&self, id: &str, playlist_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE channels SET uploads_playlist_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(playlist_id)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity_type: "channel".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn record_success(&self, id: &str) -> Result<()> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE channels SET
                consecutive_failures = 0,
                health_status = 'healthy',
                last_success_at = ?,
                last_failure_reason = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity_type: "channel".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn record_failure(&self, id: &str, reason: &str) -> Result<Channel> {
        let now = Utc::now().timestamp();

        // Increment and re-derive the status in one statement so concurrent
        // writers cannot lose a failure.
        let result = sqlx::query(
            r#"
            UPDATE channels SET
                consecutive_failures = consecutive_failures + 1,
                health_status = CASE
                    WHEN consecutive_failures + 1 >= 10 THEN 'dead'
                    WHEN consecutive_failures + 1 >= 5 THEN 'unhealthy'
                    WHEN consecutive_failures + 1 >= 2 THEN 'warning'
                    ELSE 'healthy'
                END,
                last_failure_at = ?,
                last_failure_reason = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(reason)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity_type: "channel".to_string(),
                id: id.to_string(),
            });
        }

        self.get(id).await?.ok_or_else(|| StoreError::NotFound {
            entity_type: "channel".to_string(),
            id: id.to_string(),
        })
    }

    async fn reset_health(&self, ids: &[String]) -> Result<u64> {
        let now = Utc::now().timestamp();
        let mut reset = 0u64;

        for id in ids {
            let result = sqlx::query(
                r#"
                UPDATE channels SET
                    consecutive_failures = 0,
                    health_status = 'healthy',
                    last_failure_reason = NULL,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
            reset += result.rows_affected();
        }

        debug!(reset, "Reset channel health");
        Ok(reset)
    }

    async fn set_activity_level(&self, id: &str, level: ActivityLevel) -> Result<()> {
        sqlx::query("UPDATE channels SET activity_level = ?, updated_at = ? WHERE id = ?")
            .bind(level.as_str())
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Channel>> {
        let channels = sqlx::query_as::<_, Channel>("SELECT * FROM channels ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn sample_channel(external_id: &str) -> NewChannel {
        NewChannel {
            external_id: external_id.to_string(),
            title: format!("Channel {}", external_id),
            thumbnail_url: Some("https://example.com/thumb.jpg".to_string()),
            uploads_playlist_id: Some(format!("UU{}", external_id)),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteChannelRepository::new(pool);

        let first = repo.upsert(&sample_channel("UCabc")).await.unwrap();
        let mut updated = sample_channel("UCabc");
        updated.title = "Renamed".to_string();
        let second = repo.upsert(&updated).await.unwrap();

        assert_eq!(first.id, second.id, "Upsert must not create a second row");
        assert_eq!(second.title, "Renamed");
    }

    #[tokio::test]
    async fn test_upsert_preserves_health_fields() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteChannelRepository::new(pool);

        let channel = repo.upsert(&sample_channel("UCabc")).await.unwrap();
        repo.record_failure(&channel.id, "timeout").await.unwrap();
        repo.record_failure(&channel.id, "timeout").await.unwrap();

        let after = repo.upsert(&sample_channel("UCabc")).await.unwrap();
        assert_eq!(after.consecutive_failures, 2);
        assert_eq!(after.health_status, "warning");
    }

    #[tokio::test]
    async fn test_upsert_keeps_playlist_when_refresh_omits_it() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteChannelRepository::new(pool);

        repo.upsert(&sample_channel("UCabc")).await.unwrap();
        let mut without_playlist = sample_channel("UCabc");
        without_playlist.uploads_playlist_id = None;
        let after = repo.upsert(&without_playlist).await.unwrap();

        assert_eq!(after.uploads_playlist_id.as_deref(), Some("UUUCabc"));
    }

    #[tokio::test]
    async fn test_failure_counter_drives_status() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteChannelRepository::new(pool);
        let channel = repo.upsert(&sample_channel("UCabc")).await.unwrap();

        let mut last = channel.clone();
        for _ in 0..10 {
            last = repo.record_failure(&channel.id, "gone").await.unwrap();
        }
        assert_eq!(last.consecutive_failures, 10);
        assert_eq!(last.health_status, "dead");
        assert_eq!(last.last_failure_reason.as_deref(), Some("gone"));

        repo.record_success(&channel.id).await.unwrap();
        let revived = repo.get(&channel.id).await.unwrap().unwrap();
        assert_eq!(revived.consecutive_failures, 0);
        assert_eq!(revived.health_status, "healthy");
        assert!(revived.last_success_at.is_some());
    }

    #[tokio::test]
    async fn test_record_failure_unknown_channel() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteChannelRepository::new(pool);

        let result = repo.record_failure("missing", "whatever").await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_reset_health() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteChannelRepository::new(pool);

        let a = repo.upsert(&sample_channel("UCa")).await.unwrap();
        let b = repo.upsert(&sample_channel("UCb")).await.unwrap();
        for _ in 0..10 {
            repo.record_failure(&a.id, "gone").await.unwrap();
        }

        let reset = repo
            .reset_health(&[a.id.clone(), b.id.clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(reset, 2);

        let dead = repo.list_by_health(HealthStatus::Dead).await.unwrap();
        assert!(dead.is_empty());
    }
}
