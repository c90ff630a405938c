//! # Subscription Repository
//!
//! The link table between users and channels. Links are inserted with
//! `ON CONFLICT DO NOTHING` so repeated imports never clobber an existing
//! row, and `group_id` is left untouched on purpose: group assignment is an
//! explicit user action, never part of sync.

use crate::models::Subscription;
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Link a user to a channel. Returns `true` if the link was created,
    /// `false` if it already existed.
    async fn link(&self, user_id: &str, channel_id: &str) -> Result<bool>;

    /// Remove a link. Returns `true` if a row was deleted.
    async fn unlink(&self, user_id: &str, channel_id: &str) -> Result<bool>;

    /// List a user's subscriptions
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Subscription>>;

    /// Count a user's subscriptions
    async fn count_for_user(&self, user_id: &str) -> Result<i64>;
}

/// SQLite implementation of [`SubscriptionRepository`]
pub struct SqliteSubscriptionRepository {
    pool: Pool<Sqlite>,
}

impl SqliteSubscriptionRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SqliteSubscriptionRepository {
    async fn link(&self, user_id: &str, channel_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, channel_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, channel_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(channel_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unlink(&self, user_id: &str, channel_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = ? AND channel_id = ?")
            .bind(user_id)
            .bind(channel_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE user_id = ? ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
