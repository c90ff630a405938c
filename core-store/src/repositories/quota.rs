//! # Quota Repository
//!
//! The shared daily quota counter. The increment is a single guarded
//! statement (`units_used + ? <= ?`) so concurrent consumers race on the
//! database row, not on an in-memory snapshot, and can never push usage
//! past the ceiling.

use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

#[async_trait]
pub trait QuotaRepository: Send + Sync {
    /// Units used so far on the given day; zero if no row exists yet
    async fn usage_for_day(&self, day: &str) -> Result<i64>;

    /// Atomically add `units` to the day's counter if doing so stays at or
    /// under `ceiling`. Returns `false` when the increment was refused.
    async fn try_consume(&self, day: &str, units: i64, ceiling: i64) -> Result<bool>;
}

/// SQLite implementation of [`QuotaRepository`]
pub struct SqliteQuotaRepository {
    pool: Pool<Sqlite>,
}

impl SqliteQuotaRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaRepository for SqliteQuotaRepository {
    async fn usage_for_day(&self, day: &str) -> Result<i64> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT units_used FROM quota_usage WHERE day = ?")
                .bind(day)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(units,)| units).unwrap_or(0))
    }

    async fn try_consume(&self, day: &str, units: i64, ceiling: i64) -> Result<bool> {
        let now = Utc::now().timestamp();

        // Ensure the day row exists; harmless if it already does.
        sqlx::query(
            "INSERT OR IGNORE INTO quota_usage (day, units_used, updated_at) VALUES (?, 0, ?)",
        )
        .bind(day)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE quota_usage
            SET units_used = units_used + ?, updated_at = ?
            WHERE day = ? AND units_used + ? <= ?
            "#,
        )
        .bind(units)
        .bind(now)
        .bind(day)
        .bind(units)
        .bind(ceiling)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
