//! # Alert Repository
//!
//! Stored anomalies raised by post-run analysis. The structured `data`
//! payload is kept as JSON text; acknowledgement mutates only the flag.

use crate::models::{Alert, AlertSeverity, AlertType};
use crate::{Result, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

/// A new alert to persist.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Persist an alert and return the stored row
    async fn insert(&self, alert: NewAlert) -> Result<Alert>;

    /// Get an alert by id
    async fn get(&self, id: &str) -> Result<Option<Alert>>;

    /// List alerts not yet acknowledged, newest first
    async fn list_unacknowledged(&self) -> Result<Vec<Alert>>;

    /// List the most recent alerts regardless of state
    async fn list_recent(&self, limit: i64) -> Result<Vec<Alert>>;

    /// Mark an alert acknowledged. Returns `false` if it was already
    /// acknowledged or does not exist.
    async fn acknowledge(&self, id: &str) -> Result<bool>;
}

/// SQLite implementation of [`AlertRepository`]
pub struct SqliteAlertRepository {
    pool: Pool<Sqlite>,
}

impl SqliteAlertRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertRepository for SqliteAlertRepository {
    async fn insert(&self, alert: NewAlert) -> Result<Alert> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO alerts (id, alert_type, severity, title, message, data, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(alert.data.to_string())
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get(&id).await?.ok_or_else(|| StoreError::NotFound {
            entity_type: "alert".to_string(),
            id,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<Alert>> {
        let alert = sqlx::query_as::<_, Alert>("SELECT * FROM alerts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(alert)
    }

    async fn list_unacknowledged(&self) -> Result<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(
            "SELECT * FROM alerts WHERE acknowledged = 0 ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(alerts)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Alert>> {
        let alerts =
            sqlx::query_as::<_, Alert>("SELECT * FROM alerts ORDER BY created_at DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        Ok(alerts)
    }

    async fn acknowledge(&self, id: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE alerts SET acknowledged = 1 WHERE id = ? AND acknowledged = 0")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use serde_json::json;

    fn sample_alert() -> NewAlert {
        NewAlert {
            alert_type: AlertType::QuotaWarning,
            severity: AlertSeverity::Warning,
            title: "Quota at 85%".to_string(),
            message: "8500 of 10000 units used".to_string(),
            data: json!({ "used": 8500, "ceiling": 10000 }),
        }
    }

    #[tokio::test]
    async fn test_insert_and_round_trip() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteAlertRepository::new(pool);

        let alert = repo.insert(sample_alert()).await.unwrap();
        assert_eq!(alert.alert_type, "quota_warning");
        assert_eq!(alert.severity, "warning");
        assert!(!alert.acknowledged);

        let data: serde_json::Value = serde_json::from_str(&alert.data).unwrap();
        assert_eq!(data["used"], 8500);
    }

    #[tokio::test]
    async fn test_acknowledge_mutates_only_the_flag() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteAlertRepository::new(pool);

        let alert = repo.insert(sample_alert()).await.unwrap();
        assert!(repo.acknowledge(&alert.id).await.unwrap());
        assert!(!repo.acknowledge(&alert.id).await.unwrap());

        let stored = repo.get(&alert.id).await.unwrap().unwrap();
        assert!(stored.acknowledged);
        assert_eq!(stored.title, alert.title);
        assert!(repo.list_unacknowledged().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_recent_limit() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteAlertRepository::new(pool);

        for _ in 0..5 {
            repo.insert(sample_alert()).await.unwrap();
        }
        assert_eq!(repo.list_recent(3).await.unwrap().len(), 3);
    }
}
