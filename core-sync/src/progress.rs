//! # Sync Progress Tracker
//!
//! Persisted, resumable state for one sync run, and the read side that
//! status-polling clients consume.
//!
//! ## Overview
//!
//! Each run appends one `sync_progress` row (last N retained per user) and
//! mutates it through a single-writer [`ProgressTracker`] that persists
//! after every meaningful transition. The `current` counter is never trusted
//! independently: it is recomputed from the processed/failed counters on
//! every mutation so it cannot drift. ETA is a pure read-side computation,
//! never persisted.

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

// =============================================================================
// Phase
// =============================================================================

/// Phase of a sync run
///
/// `Error` is reachable from any non-terminal phase; `Complete` and `Error`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Starting,
    FetchingSubscriptions,
    FetchingChannelDetails,
    SyncingVideos,
    Completing,
    Complete,
    Error,
}

impl SyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Complete | SyncPhase::Error)
    }

    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Starting => "starting",
            SyncPhase::FetchingSubscriptions => "fetching_subscriptions",
            SyncPhase::FetchingChannelDetails => "fetching_channel_details",
            SyncPhase::SyncingVideos => "syncing_videos",
            SyncPhase::Completing => "completing",
            SyncPhase::Complete => "complete",
            SyncPhase::Error => "error",
        }
    }
}

impl FromStr for SyncPhase {
    type Err = SyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SyncPhase::Idle),
            "starting" => Ok(SyncPhase::Starting),
            "fetching_subscriptions" => Ok(SyncPhase::FetchingSubscriptions),
            "fetching_channel_details" => Ok(SyncPhase::FetchingChannelDetails),
            "syncing_videos" => Ok(SyncPhase::SyncingVideos),
            "completing" => Ok(SyncPhase::Completing),
            "complete" => Ok(SyncPhase::Complete),
            "error" => Ok(SyncPhase::Error),
            _ => Err(SyncError::NotFound(format!("Unknown sync phase: {}", s))),
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Structured errors and stats
// =============================================================================

/// One structured error recorded against a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncErrorEntry {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub timestamp: i64,
}

impl SyncErrorEntry {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            channel_id: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }
}

/// Counters accumulated over one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub channels_processed: i64,
    pub channels_failed: i64,
    pub videos_added: i64,
    pub quota_units_used: i64,
}

// =============================================================================
// Read model
// =============================================================================

/// A progress row as read back for status polling
#[derive(Debug, Clone, Serialize)]
pub struct SyncProgress {
    pub id: String,
    pub user_id: String,
    pub phase: SyncPhase,
    pub message: Option<String>,
    pub current: i64,
    pub total: i64,
    pub current_item: Option<String>,
    pub errors: Vec<SyncErrorEntry>,
    pub stats: SyncStats,
    pub queued_channels: Option<Vec<String>>,
    pub processed_channels: Option<Vec<String>>,
    pub started_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Debug, FromRow)]
struct ProgressRow {
    id: String,
    user_id: String,
    phase: String,
    message: Option<String>,
    current: i64,
    total: i64,
    current_item: Option<String>,
    errors: String,
    channels_processed: i64,
    channels_failed: i64,
    videos_added: i64,
    quota_units_used: i64,
    queued_channels: Option<String>,
    processed_channels: Option<String>,
    started_at: i64,
    updated_at: i64,
    completed_at: Option<i64>,
}

impl TryFrom<ProgressRow> for SyncProgress {
    type Error = SyncError;

    fn try_from(row: ProgressRow) -> Result<Self> {
        let phase: SyncPhase = row.phase.parse()?;
        let errors: Vec<SyncErrorEntry> = serde_json::from_str(&row.errors)?;
        let queued_channels = row
            .queued_channels
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let processed_channels = row
            .processed_channels
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(SyncProgress {
            id: row.id,
            user_id: row.user_id,
            phase,
            message: row.message,
            current: row.current,
            total: row.total,
            current_item: row.current_item,
            errors,
            stats: SyncStats {
                channels_processed: row.channels_processed,
                channels_failed: row.channels_failed,
                videos_added: row.videos_added,
                quota_units_used: row.quota_units_used,
            },
            queued_channels,
            processed_channels,
            started_at: row.started_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

// =============================================================================
// ETA
// =============================================================================

/// Derived completion estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EtaEstimate {
    pub remaining_seconds: i64,
    /// Unix seconds
    pub estimated_completion: i64,
}

/// Average seconds-per-channel ceiling; one pathological channel must not
/// skew the whole estimate
const ETA_AVG_CAP_SECS: f64 = 300.0;

/// Safety margin applied to the remaining-time estimate
const ETA_MARGIN: f64 = 1.1;

/// Estimate time to completion from a progress snapshot.
///
/// Undefined until at least 3 channels have been processed.
pub fn estimate_eta(progress: &SyncProgress, now: i64) -> Option<EtaEstimate> {
    if progress.stats.channels_processed < 3 || progress.phase.is_terminal() {
        return None;
    }

    let elapsed = (now - progress.started_at).max(0) as f64;
    let avg = (elapsed / progress.stats.channels_processed as f64).min(ETA_AVG_CAP_SECS);
    let remaining_channels = (progress.total - progress.current).max(0) as f64;
    let remaining_seconds = (avg * remaining_channels * ETA_MARGIN).round() as i64;

    Some(EtaEstimate {
        remaining_seconds,
        estimated_completion: now + remaining_seconds,
    })
}

// =============================================================================
// Tracker (single writer)
// =============================================================================

/// Single-writer progress state for one run.
///
/// Holds the row in memory and persists after every meaningful transition.
/// `add_quota_usage` is the one exception: it only accumulates, piggybacking
/// on the next persisted mutation to keep write volume down.
pub struct ProgressTracker {
    pool: SqlitePool,
    sync_id: String,
    user_id: String,
    phase: SyncPhase,
    message: Option<String>,
    current: i64,
    total: i64,
    current_item: Option<String>,
    errors: Vec<SyncErrorEntry>,
    stats: SyncStats,
    queued_channels: Option<Vec<String>>,
    processed_channels: Option<Vec<String>>,
    started_at: i64,
    completed_at: Option<i64>,
}

impl ProgressTracker {
    /// Begin a new run: prune history past the retention limit and insert a
    /// fresh row in the `starting` phase.
    pub async fn start(
        pool: SqlitePool,
        user_id: &str,
        retention: u32,
        total: i64,
    ) -> Result<Self> {
        let now = chrono::Utc::now().timestamp();
        let sync_id = Uuid::new_v4().to_string();

        // Keep the newest retention-1 rows; the new row makes it N.
        sqlx::query(
            r#"
            DELETE FROM sync_progress
            WHERE user_id = ? AND id NOT IN (
                SELECT id FROM sync_progress
                WHERE user_id = ?
                ORDER BY updated_at DESC
                LIMIT ?
            )
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(retention.saturating_sub(1) as i64)
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO sync_progress (id, user_id, phase, total, errors, started_at, updated_at)
            VALUES (?, ?, 'starting', ?, '[]', ?, ?)
            "#,
        )
        .bind(&sync_id)
        .bind(user_id)
        .bind(total.max(0))
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await?;

        debug!(user_id, sync_id = %sync_id, total, "Started sync progress");

        Ok(Self {
            pool,
            sync_id,
            user_id: user_id.to_string(),
            phase: SyncPhase::Starting,
            message: None,
            current: 0,
            total: total.max(0),
            current_item: None,
            errors: Vec::new(),
            stats: SyncStats::default(),
            queued_channels: None,
            processed_channels: None,
            started_at: now,
            completed_at: None,
        })
    }

    pub fn sync_id(&self) -> &str {
        &self.sync_id
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn errors(&self) -> &[SyncErrorEntry] {
        &self.errors
    }

    /// current is always processed + failed, clamped into [0, total]
    /// whenever a total is known
    fn recompute_current(&mut self) {
        let mut current = self.stats.channels_processed + self.stats.channels_failed;
        if self.total > 0 {
            current = current.min(self.total);
        }
        self.current = current.max(0);
    }

    async fn persist(&self) -> Result<()> {
        let errors = serde_json::to_string(&self.errors)?;
        let queued = self
            .queued_channels
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let processed = self
            .processed_channels
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            UPDATE sync_progress SET
                phase = ?, message = ?, current = ?, total = ?, current_item = ?,
                errors = ?, channels_processed = ?, channels_failed = ?,
                videos_added = ?, quota_units_used = ?,
                queued_channels = ?, processed_channels = ?,
                updated_at = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(self.phase.as_str())
        .bind(&self.message)
        .bind(self.current)
        .bind(self.total)
        .bind(&self.current_item)
        .bind(errors)
        .bind(self.stats.channels_processed)
        .bind(self.stats.channels_failed)
        .bind(self.stats.videos_added)
        .bind(self.stats.quota_units_used)
        .bind(queued)
        .bind(processed)
        .bind(chrono::Utc::now().timestamp())
        .bind(self.completed_at)
        .bind(&self.sync_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Transition to a new phase
    pub async fn set_phase(&mut self, phase: SyncPhase, message: Option<&str>) -> Result<()> {
        if self.phase.is_terminal() {
            return Err(SyncError::InvalidTransition {
                from: self.phase.to_string(),
                to: phase.to_string(),
            });
        }
        self.phase = phase;
        self.message = message.map(String::from);
        self.persist().await
    }

    /// Legacy raw progress update; clamps `current` into `[0, total]`.
    /// Counter-driven recomputation remains the source of truth and will
    /// overwrite this value on the next processed/failed call.
    pub async fn update_progress(
        &mut self,
        current: i64,
        current_item: Option<&str>,
        message: Option<&str>,
    ) -> Result<()> {
        let mut current = current.max(0);
        if self.total > 0 {
            current = current.min(self.total);
        }
        self.current = current;
        if current_item.is_some() {
            self.current_item = current_item.map(String::from);
        }
        if message.is_some() {
            self.message = message.map(String::from);
        }
        self.persist().await
    }

    pub async fn set_total(&mut self, total: i64) -> Result<()> {
        self.total = total.max(0);
        self.recompute_current();
        self.persist().await
    }

    /// Record the channel id set queued for this run; resets the processed
    /// list so resume state starts clean.
    pub async fn set_queued_channels(&mut self, ids: Vec<String>) -> Result<()> {
        self.queued_channels = Some(ids);
        self.processed_channels = Some(Vec::new());
        self.persist().await
    }

    /// One channel finished successfully
    pub async fn channel_processed(
        &mut self,
        videos_added: i64,
        channel_id: Option<&str>,
    ) -> Result<()> {
        self.stats.channels_processed += 1;
        self.stats.videos_added += videos_added.max(0);
        if let Some(id) = channel_id {
            self.processed_channels
                .get_or_insert_with(Vec::new)
                .push(id.to_string());
            self.current_item = Some(id.to_string());
        }
        self.recompute_current();
        self.persist().await
    }

    /// One channel failed; the run continues
    pub async fn channel_failed(&mut self, error: SyncErrorEntry) -> Result<()> {
        self.stats.channels_failed += 1;
        self.errors.push(error);
        self.recompute_current();
        self.persist().await
    }

    /// Accumulate quota spend without forcing a write
    pub fn add_quota_usage(&mut self, units: i64) {
        self.stats.quota_units_used += units.max(0);
    }

    /// Terminal success
    pub async fn complete(&mut self, message: Option<&str>) -> Result<()> {
        if self.phase.is_terminal() {
            return Err(SyncError::InvalidTransition {
                from: self.phase.to_string(),
                to: SyncPhase::Complete.to_string(),
            });
        }
        self.phase = SyncPhase::Complete;
        self.message = message.map(String::from);
        self.completed_at = Some(chrono::Utc::now().timestamp());
        self.persist().await
    }

    /// Terminal failure
    pub async fn error(&mut self, message: &str) -> Result<()> {
        if self.phase.is_terminal() {
            return Err(SyncError::InvalidTransition {
                from: self.phase.to_string(),
                to: SyncPhase::Error.to_string(),
            });
        }
        self.phase = SyncPhase::Error;
        self.message = Some(message.to_string());
        self.completed_at = Some(chrono::Utc::now().timestamp());
        self.persist().await
    }
}

// =============================================================================
// Read side
// =============================================================================

/// Read-only access to progress rows for status polling
pub struct ProgressReader {
    pool: SqlitePool,
}

impl ProgressReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The most recently updated progress row for a user
    pub async fn current(&self, user_id: &str) -> Result<Option<SyncProgress>> {
        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT * FROM sync_progress
            WHERE user_id = ?
            ORDER BY updated_at DESC, started_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncProgress::try_from).transpose()
    }

    /// Recent runs, newest first
    pub async fn history(&self, user_id: &str, limit: i64) -> Result<Vec<SyncProgress>> {
        let rows = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT * FROM sync_progress
            WHERE user_id = ?
            ORDER BY updated_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SyncProgress::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_store::create_test_pool;

    async fn tracker(pool: &SqlitePool, total: i64) -> ProgressTracker {
        ProgressTracker::start(pool.clone(), "user-1", 10, total)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_current_is_recomputed_from_counters() {
        let pool = create_test_pool().await.unwrap();
        let mut tracker = tracker(&pool, 50).await;

        for _ in 0..3 {
            tracker.channel_processed(2, Some("UCx")).await.unwrap();
        }
        assert_eq!(tracker.current(), 3);

        tracker
            .channel_failed(SyncErrorEntry::new("FETCH_FAILED", "timeout"))
            .await
            .unwrap();
        assert_eq!(tracker.current(), 4);
        assert_eq!(tracker.stats().channels_failed, 1);
        assert_eq!(tracker.stats().videos_added, 6);
    }

    #[tokio::test]
    async fn test_current_never_exceeds_total() {
        let pool = create_test_pool().await.unwrap();
        let mut tracker = tracker(&pool, 2).await;

        for _ in 0..5 {
            tracker.channel_processed(0, None).await.unwrap();
        }
        assert_eq!(tracker.current(), 2);
    }

    #[tokio::test]
    async fn test_legacy_update_clamps() {
        let pool = create_test_pool().await.unwrap();
        let mut tracker = tracker(&pool, 10).await;

        tracker.update_progress(99, None, None).await.unwrap();
        assert_eq!(tracker.current(), 10);

        tracker.update_progress(-5, None, None).await.unwrap();
        assert_eq!(tracker.current(), 0);
    }

    #[tokio::test]
    async fn test_terminal_phases_reject_transitions() {
        let pool = create_test_pool().await.unwrap();
        let mut tracker = tracker(&pool, 1).await;

        tracker.complete(Some("done")).await.unwrap();
        let result = tracker.set_phase(SyncPhase::SyncingVideos, None).await;
        assert!(matches!(result, Err(SyncError::InvalidTransition { .. })));
        assert!(tracker.error("late failure").await.is_err());
    }

    #[tokio::test]
    async fn test_quota_usage_piggybacks_on_next_write() {
        let pool = create_test_pool().await.unwrap();
        let mut tracker = tracker(&pool, 5).await;
        let reader = ProgressReader::new(pool.clone());

        tracker.add_quota_usage(7);
        // Not yet persisted.
        let stored = reader.current("user-1").await.unwrap().unwrap();
        assert_eq!(stored.stats.quota_units_used, 0);

        tracker.channel_processed(1, Some("UCx")).await.unwrap();
        let stored = reader.current("user-1").await.unwrap().unwrap();
        assert_eq!(stored.stats.quota_units_used, 7);
    }

    #[tokio::test]
    async fn test_errors_round_trip_through_storage() {
        let pool = create_test_pool().await.unwrap();
        let mut tracker = tracker(&pool, 5).await;
        let reader = ProgressReader::new(pool.clone());

        tracker
            .channel_failed(SyncErrorEntry::new("FETCH_FAILED", "channel gone").with_channel("UCx"))
            .await
            .unwrap();

        let stored = reader.current("user-1").await.unwrap().unwrap();
        assert_eq!(stored.errors.len(), 1);
        assert_eq!(stored.errors[0].code, "FETCH_FAILED");
        assert_eq!(stored.errors[0].channel_id.as_deref(), Some("UCx"));
    }

    #[tokio::test]
    async fn test_queued_channels_reset_processed_list() {
        let pool = create_test_pool().await.unwrap();
        let mut tracker = tracker(&pool, 2).await;
        let reader = ProgressReader::new(pool.clone());

        tracker
            .set_queued_channels(vec!["a".into(), "b".into()])
            .await
            .unwrap();
        tracker.channel_processed(0, Some("a")).await.unwrap();

        let stored = reader.current("user-1").await.unwrap().unwrap();
        assert_eq!(stored.queued_channels.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert_eq!(stored.processed_channels.as_deref(), Some(&["a".to_string()][..]));
    }

    #[tokio::test]
    async fn test_history_retention_prunes_old_rows() {
        let pool = create_test_pool().await.unwrap();

        for _ in 0..5 {
            let mut t = ProgressTracker::start(pool.clone(), "user-1", 3, 1)
                .await
                .unwrap();
            t.complete(None).await.unwrap();
        }

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sync_progress WHERE user_id = 'user-1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 3);
    }

    fn snapshot(processed: i64, failed: i64, total: i64, started_at: i64) -> SyncProgress {
        SyncProgress {
            id: "sync-1".into(),
            user_id: "user-1".into(),
            phase: SyncPhase::SyncingVideos,
            message: None,
            current: (processed + failed).min(total),
            total,
            current_item: None,
            errors: vec![],
            stats: SyncStats {
                channels_processed: processed,
                channels_failed: failed,
                videos_added: 0,
                quota_units_used: 0,
            },
            queued_channels: None,
            processed_channels: None,
            started_at,
            updated_at: started_at,
            completed_at: None,
        }
    }

    #[test]
    fn test_eta_undefined_below_three_channels() {
        let progress = snapshot(2, 0, 50, 1_000);
        assert!(estimate_eta(&progress, 1_100).is_none());
    }

    #[test]
    fn test_eta_uses_average_with_margin() {
        // 10 channels in 100s: 10s/channel, 40 remaining.
        let progress = snapshot(10, 0, 50, 1_000);
        let eta = estimate_eta(&progress, 1_100).unwrap();
        assert_eq!(eta.remaining_seconds, 440);
        assert_eq!(eta.estimated_completion, 1_540);
    }

    #[test]
    fn test_eta_caps_average_seconds_per_channel() {
        // 3 channels in 3000s would be 1000s/channel; cap at 300.
        let progress = snapshot(3, 0, 5, 0);
        let eta = estimate_eta(&progress, 3_000).unwrap();
        assert_eq!(eta.remaining_seconds, (300.0 * 2.0 * 1.1) as i64);
    }

    #[test]
    fn test_eta_non_negative_when_done() {
        let progress = snapshot(50, 0, 50, 0);
        let eta = estimate_eta(&progress, 500).unwrap();
        assert_eq!(eta.remaining_seconds, 0);
    }
}
