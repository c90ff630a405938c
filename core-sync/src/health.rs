//! # Channel Health Tracker
//!
//! Per-channel consecutive-failure tracking and the skip/retry signals the
//! orchestrator consumes.
//!
//! ## Overview
//!
//! Health lives on the channel row and is shared across every subscriber: a
//! failure observed while syncing for one user degrades the channel for all
//! of them, because failures are a property of the channel, not the user.
//! Status is a pure function of the counter (0-1 healthy, 2-4 warning, 5-9
//! unhealthy, >=10 dead); any success resets it.

use crate::Result;
use core_store::models::{Channel, HealthStatus};
use core_store::repositories::ChannelRepository;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of recording one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// Cheap immediate-retry eligibility: fewer than 3 consecutive failures
    pub should_retry: bool,
    /// Unhealthy or dead
    pub is_unhealthy: bool,
    /// This failure crossed the dead threshold
    pub became_dead: bool,
}

/// Immediate-retry cutoff on the consecutive-failure count
const RETRY_FAILURE_CUTOFF: i64 = 3;

/// Channel health tracker
pub struct HealthTracker {
    channels: Arc<dyn ChannelRepository>,
}

impl HealthTracker {
    pub fn new(channels: Arc<dyn ChannelRepository>) -> Self {
        Self { channels }
    }

    /// A fetch succeeded: reset the counter and status
    pub async fn record_success(&self, channel_id: &str) -> Result<()> {
        self.channels.record_success(channel_id).await?;
        Ok(())
    }

    /// A fetch failed: bump the counter, derive the new status, and return
    /// the retry/skip signals.
    pub async fn record_failure(&self, channel_id: &str, reason: &str) -> Result<FailureOutcome> {
        let channel = self.channels.record_failure(channel_id, reason).await?;
        let status = channel
            .health()
            .unwrap_or(HealthStatus::Dead);

        let outcome = FailureOutcome {
            should_retry: channel.consecutive_failures < RETRY_FAILURE_CUTOFF,
            is_unhealthy: matches!(status, HealthStatus::Unhealthy | HealthStatus::Dead),
            became_dead: status == HealthStatus::Dead && channel.consecutive_failures == 10,
        };

        if outcome.became_dead {
            warn!(channel_id, reason, "Channel crossed the dead threshold");
        }
        Ok(outcome)
    }

    /// Degraded channels (warning or worse) among a user's subscriptions
    pub async fn unhealthy_channels(&self, user_id: &str) -> Result<Vec<Channel>> {
        Ok(self.channels.list_degraded_for_user(user_id).await?)
    }

    /// Administrative reset: zero counters and revive the given channels
    pub async fn revive_dead_channels(&self, channel_ids: &[String]) -> Result<u64> {
        let revived = self.channels.reset_health(channel_ids).await?;
        info!(revived, "Revived dead channels");
        Ok(revived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_store::create_test_pool;
    use core_store::models::NewChannel;
    use core_store::repositories::SqliteChannelRepository;
    use sqlx::SqlitePool;

    async fn setup(pool: &SqlitePool) -> (HealthTracker, Arc<dyn ChannelRepository>, String) {
        let repo: Arc<dyn ChannelRepository> =
            Arc::new(SqliteChannelRepository::new(pool.clone()));
        let channel = repo
            .upsert(&NewChannel {
                external_id: "UCabc".to_string(),
                title: "Test Channel".to_string(),
                thumbnail_url: None,
                uploads_playlist_id: Some("UUabc".to_string()),
            })
            .await
            .unwrap();
        (HealthTracker::new(repo.clone()), repo, channel.id)
    }

    #[tokio::test]
    async fn test_retry_signal_cuts_off_at_three_failures() {
        let pool = create_test_pool().await.unwrap();
        let (tracker, _, id) = setup(&pool).await;

        let first = tracker.record_failure(&id, "timeout").await.unwrap();
        assert!(first.should_retry);
        let second = tracker.record_failure(&id, "timeout").await.unwrap();
        assert!(second.should_retry);
        let third = tracker.record_failure(&id, "timeout").await.unwrap();
        assert!(!third.should_retry);
        assert!(!third.is_unhealthy);
    }

    #[tokio::test]
    async fn test_tenth_failure_becomes_dead_exactly_once() {
        let pool = create_test_pool().await.unwrap();
        let (tracker, _, id) = setup(&pool).await;

        let mut died_count = 0;
        for _ in 0..12 {
            let outcome = tracker.record_failure(&id, "gone").await.unwrap();
            if outcome.became_dead {
                died_count += 1;
            }
        }
        assert_eq!(died_count, 1);
    }

    #[tokio::test]
    async fn test_success_resets_regardless_of_count() {
        let pool = create_test_pool().await.unwrap();
        let (tracker, repo, id) = setup(&pool).await;

        for _ in 0..7 {
            tracker.record_failure(&id, "flaky").await.unwrap();
        }
        tracker.record_success(&id).await.unwrap();

        let channel = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(channel.consecutive_failures, 0);
        assert_eq!(channel.health().unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_unhealthy_listing_scoped_to_subscriptions() {
        let pool = create_test_pool().await.unwrap();
        let (tracker, _, id) = setup(&pool).await;

        for _ in 0..5 {
            tracker.record_failure(&id, "broken").await.unwrap();
        }

        // Not subscribed yet: nothing to report.
        assert!(tracker.unhealthy_channels("user-1").await.unwrap().is_empty());

        sqlx::query("INSERT INTO subscriptions (user_id, channel_id, created_at) VALUES ('user-1', ?, 0)")
            .bind(&id)
            .execute(&pool)
            .await
            .unwrap();

        let degraded = tracker.unhealthy_channels("user-1").await.unwrap();
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].health_status, "unhealthy");
    }

    #[tokio::test]
    async fn test_revive_returns_count() {
        let pool = create_test_pool().await.unwrap();
        let (tracker, repo, id) = setup(&pool).await;

        for _ in 0..10 {
            tracker.record_failure(&id, "gone").await.unwrap();
        }
        let revived = tracker.revive_dead_channels(&[id.clone()]).await.unwrap();
        assert_eq!(revived, 1);

        let channel = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(channel.health().unwrap(), HealthStatus::Healthy);
    }
}
