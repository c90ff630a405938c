//! # Sync Status Service
//!
//! The outward-facing read surface: progress snapshots with liveness and
//! ETA, plus cancellation and the operator lock escape hatch.
//!
//! ## Overview
//!
//! Liveness is decided lock-first: a live lock means a run is active even
//! when the progress row looks stale. Without a lock, a non-terminal phase
//! only counts as active while its last update is inside the staleness
//! window, so a crashed run stops reporting as running on its own.

use crate::config::SyncConfig;
use crate::lock::{LockManager, SyncLock};
use crate::progress::{estimate_eta, EtaEstimate, ProgressReader, SyncProgress};
use crate::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Point-in-time view of a user's sync state
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Latest progress row, if any run has ever happened
    pub progress: Option<SyncProgress>,
    /// Whether a run is currently live
    pub is_active: bool,
    /// Completion estimate for an active run, when computable
    pub eta: Option<EtaEstimate>,
}

/// Read-side status and cancellation surface
pub struct SyncStatusService {
    config: SyncConfig,
    locks: Arc<LockManager>,
    progress: ProgressReader,
}

impl SyncStatusService {
    pub fn new(config: SyncConfig, pool: SqlitePool, locks: Arc<LockManager>) -> Self {
        Self {
            config,
            locks,
            progress: ProgressReader::new(pool),
        }
    }

    /// Current status for a user
    #[instrument(skip(self))]
    pub async fn status(&self, user_id: &str) -> Result<SyncStatus> {
        let now = chrono::Utc::now().timestamp();
        let progress = self.progress.current(user_id).await?;
        let is_active = self.is_active(user_id, progress.as_ref(), now).await?;
        let eta = match (&progress, is_active) {
            (Some(p), true) => estimate_eta(p, now),
            _ => None,
        };

        Ok(SyncStatus {
            progress,
            is_active,
            eta,
        })
    }

    async fn is_active(
        &self,
        user_id: &str,
        progress: Option<&SyncProgress>,
        now: i64,
    ) -> Result<bool> {
        if self.locks.is_held(user_id).await? {
            return Ok(true);
        }

        // No lock: only a freshly-updated non-terminal row counts.
        Ok(progress
            .map(|p| {
                !p.phase.is_terminal()
                    && now - p.updated_at <= self.config.staleness_window.as_secs() as i64
            })
            .unwrap_or(false))
    }

    /// Recent runs, newest first
    pub async fn history(&self, user_id: &str, limit: i64) -> Result<Vec<SyncProgress>> {
        self.progress.history(user_id, limit).await
    }

    /// Request cooperative cancellation of the user's active run.
    ///
    /// Sets the flag for the running loop to observe, then schedules a
    /// forced lock clear after the grace period in case the run never
    /// reaches a poll point. Returns whether a run was there to cancel.
    #[instrument(skip(self))]
    pub async fn request_cancellation(&self, user_id: &str) -> Result<bool> {
        let requested = self.locks.request_cancellation(user_id).await?;
        if !requested {
            return Ok(false);
        }

        info!(user_id, "Cancellation requested");
        let locks = self.locks.clone();
        let user = user_id.to_string();
        let grace = self.config.cancellation_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            match locks.clear(&user).await {
                Ok(true) => warn!(user_id = %user, "Run ignored cancellation, lock force-cleared"),
                Ok(false) => {}
                Err(e) => warn!(user_id = %user, error = %e, "Forced lock clear failed"),
            }
        });
        Ok(true)
    }

    /// Inspect the user's lock row, expired or not
    pub async fn inspect_lock(&self, user_id: &str) -> Result<Option<SyncLock>> {
        self.locks.inspect(user_id).await
    }

    /// Operator escape hatch: drop the lock regardless of holder
    pub async fn clear_lock(&self, user_id: &str) -> Result<bool> {
        let cleared = self.locks.clear(user_id).await?;
        if cleared {
            warn!(user_id, "Sync lock force-cleared");
        }
        Ok(cleared)
    }
}
