//! # Video Repository
//!
//! Per-user video rows. Inserts key on `(user_id, external_id)` and ignore
//! conflicts, so the caller can count how many rows were genuinely added by
//! a sync run. Also serves the activity-reclassification job with a single
//! aggregated recent-counts query.

use crate::models::{NewVideo, Video};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, Pool, Sqlite};
use uuid::Uuid;

/// Recent publish counts for one channel, used to classify activity.
/// Counts are over distinct uploads so multi-subscriber duplication of the
/// per-user video rows does not inflate them.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ChannelVideoCounts {
    pub channel_id: String,
    pub videos_last_week: i64,
    pub videos_last_month: i64,
}

#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Insert a video for a user. Returns `true` if a new row was added,
    /// `false` if the user already had this video.
    async fn insert_new(&self, user_id: &str, video: &NewVideo) -> Result<bool>;

    /// Most recent videos for a user, newest first
    async fn list_recent(&self, user_id: &str, limit: i64) -> Result<Vec<Video>>;

    /// Count a user's videos
    async fn count_for_user(&self, user_id: &str) -> Result<i64>;

    /// Distinct-upload publish counts per channel since the given cutoffs
    async fn recent_counts_by_channel(
        &self,
        week_cutoff: i64,
        month_cutoff: i64,
    ) -> Result<Vec<ChannelVideoCounts>>;
}

/// SQLite implementation of [`VideoRepository`]
pub struct SqliteVideoRepository {
    pool: Pool<Sqlite>,
}

impl SqliteVideoRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoRepository for SqliteVideoRepository {
    async fn insert_new(&self, user_id: &str, video: &NewVideo) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO videos (
                id, user_id, channel_id, external_id, title, thumbnail_url,
                duration_seconds, is_short, published_at, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, external_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&video.channel_id)
        .bind(&video.external_id)
        .bind(&video.title)
        .bind(&video.thumbnail_url)
        .bind(video.duration_seconds)
        .bind(video.is_short)
        .bind(video.published_at)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_recent(&self, user_id: &str, limit: i64) -> Result<Vec<Video>> {
        let videos = sqlx::query_as::<_, Video>(
            r#"
            SELECT * FROM videos
            WHERE user_id = ?
            ORDER BY published_at DESC, created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(videos)
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM videos WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn recent_counts_by_channel(
        &self,
        week_cutoff: i64,
        month_cutoff: i64,
    ) -> Result<Vec<ChannelVideoCounts>> {
        let counts = sqlx::query_as::<_, ChannelVideoCounts>(
            r#"
            SELECT
                channel_id,
                COUNT(DISTINCT CASE WHEN published_at >= ? THEN external_id END)
                    AS videos_last_week,
                COUNT(DISTINCT CASE WHEN published_at >= ? THEN external_id END)
                    AS videos_last_month
            FROM videos
            WHERE published_at IS NOT NULL AND published_at >= ?
            GROUP BY channel_id
            "#,
        )
        .bind(week_cutoff)
        .bind(month_cutoff)
        .bind(month_cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::NewChannel;
    use crate::repositories::channel::{ChannelRepository, SqliteChannelRepository};

    async fn seed_channel(pool: &Pool<Sqlite>, external_id: &str) -> String {
        let repo = SqliteChannelRepository::new(pool.clone());
        repo.upsert(&NewChannel {
            external_id: external_id.to_string(),
            title: external_id.to_string(),
            thumbnail_url: None,
            uploads_playlist_id: None,
        })
        .await
        .unwrap()
        .id
    }

    fn sample_video(channel_id: &str, external_id: &str, published_at: i64) -> NewVideo {
        NewVideo {
            channel_id: channel_id.to_string(),
            external_id: external_id.to_string(),
            title: format!("Video {}", external_id),
            thumbnail_url: None,
            duration_seconds: 300,
            is_short: false,
            published_at: Some(published_at),
        }
    }

    #[tokio::test]
    async fn test_insert_reports_only_new_rows() {
        let pool = create_test_pool().await.unwrap();
        let channel_id = seed_channel(&pool, "UCabc").await;
        let repo = SqliteVideoRepository::new(pool);

        let video = sample_video(&channel_id, "vid-1", 1_000);
        assert!(repo.insert_new("user-1", &video).await.unwrap());
        assert!(!repo.insert_new("user-1", &video).await.unwrap());

        // A second user gets an independent copy.
        assert!(repo.insert_new("user-2", &video).await.unwrap());
        assert_eq!(repo.count_for_user("user-1").await.unwrap(), 1);
        assert_eq!(repo.count_for_user("user-2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recent_counts_dedupe_across_users() {
        let pool = create_test_pool().await.unwrap();
        let channel_id = seed_channel(&pool, "UCabc").await;
        let repo = SqliteVideoRepository::new(pool);

        let now = Utc::now().timestamp();
        let week_cutoff = now - 7 * 86_400;
        let month_cutoff = now - 30 * 86_400;

        // Two videos this week, mirrored for two users; one older video.
        for user in ["user-1", "user-2"] {
            repo.insert_new(user, &sample_video(&channel_id, "vid-1", now - 3_600))
                .await
                .unwrap();
            repo.insert_new(user, &sample_video(&channel_id, "vid-2", now - 7_200))
                .await
                .unwrap();
        }
        repo.insert_new(
            "user-1",
            &sample_video(&channel_id, "vid-old", now - 20 * 86_400),
        )
        .await
        .unwrap();

        let counts = repo
            .recent_counts_by_channel(week_cutoff, month_cutoff)
            .await
            .unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].channel_id, channel_id);
        assert_eq!(counts[0].videos_last_week, 2);
        assert_eq!(counts[0].videos_last_month, 3);
    }

    #[tokio::test]
    async fn test_list_recent_orders_newest_first() {
        let pool = create_test_pool().await.unwrap();
        let channel_id = seed_channel(&pool, "UCabc").await;
        let repo = SqliteVideoRepository::new(pool);

        repo.insert_new("user-1", &sample_video(&channel_id, "old", 1_000))
            .await
            .unwrap();
        repo.insert_new("user-1", &sample_video(&channel_id, "new", 2_000))
            .await
            .unwrap();

        let videos = repo.list_recent("user-1", 10).await.unwrap();
        assert_eq!(videos[0].external_id, "new");
        assert_eq!(videos[1].external_id, "old");
    }
}
