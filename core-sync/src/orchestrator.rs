//! # Sync Orchestrator
//!
//! Drives end-to-end sync runs against the external provider.
//!
//! ## Overview
//!
//! Every flow follows the same skeleton: acquire the per-user lock (busy is
//! an immediate rejection, never a queue), check quota admission for an
//! estimated cost, walk the phases while persisting progress, and release
//! the lock on every exit path. Per-channel failures during video sync are
//! isolated — they degrade that channel's health and add an error entry,
//! but the run continues. Only unexpected errors propagate; the outer
//! wrapper converts them into a terminal `error` progress state before the
//! lock is released.
//!
//! ## Flows
//!
//! - [`SyncOrchestrator::run_subscription_import`] — mirror the user's
//!   subscription list into channels + subscription links
//! - [`SyncOrchestrator::run_video_sync`] — per-channel video import with
//!   health checks, cancellation polling, and lock heartbeats
//! - [`SyncOrchestrator::add_channel`] — single-channel subscribe + import

use crate::alerting::{AlertingService, RunAnalysis};
use crate::config::SyncConfig;
use crate::health::HealthTracker;
use crate::lock::{LockId, LockManager};
use crate::progress::{ProgressTracker, SyncErrorEntry, SyncPhase, SyncStats};
use crate::quota::{QuotaDecision, QuotaTracker};
use crate::retry::with_transient_retry;
use crate::{Result, SyncError};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_store::models::{Channel, HealthStatus, NewChannel, NewVideo};
use core_store::repositories::{
    ChannelRepository, NewSyncHistoryEntry, SqliteAlertRepository, SqliteChannelRepository,
    SqliteQuotaRepository, SqliteSubscriptionRepository, SqliteSyncHistoryRepository,
    SqliteVideoRepository, SubscriptionRepository, SyncHistoryRepository, VideoRepository,
};
use provider_youtube::{ChannelDetails, VideoListOptions, VideoPlatform};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// How a channel's historical videos are imported when it is added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Import nothing; only new uploads from here on
    NewOnly,
    /// Import the backlog with an effectively unbounded cap
    All,
}

/// Options for a video sync run
#[derive(Debug, Clone, Default)]
pub struct VideoSyncOptions {
    /// Per-channel video cap; defaults to the configured cap
    pub max_videos: Option<u32>,
    /// Keep live/scheduled entries
    pub include_live: bool,
    /// Restrict the run to these channels (internal ids)
    pub channel_ids: Option<Vec<String>>,
}

/// Result of one finished run
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub sync_id: String,
    pub stats: SyncStats,
    pub cancelled: bool,
    pub message: String,
}

/// Top-level sync driver
pub struct SyncOrchestrator {
    config: SyncConfig,
    pool: SqlitePool,
    platform: Arc<dyn VideoPlatform>,
    locks: Arc<LockManager>,
    quota: Arc<QuotaTracker>,
    health: HealthTracker,
    channels: Arc<dyn ChannelRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    videos: Arc<dyn VideoRepository>,
    history: Arc<dyn SyncHistoryRepository>,
    alerting: AlertingService,
    event_bus: Arc<EventBus>,
}

impl SyncOrchestrator {
    /// Create an orchestrator wired to SQLite repositories on the given pool
    pub fn new(
        config: SyncConfig,
        pool: SqlitePool,
        platform: Arc<dyn VideoPlatform>,
        event_bus: Arc<EventBus>,
        quota_ceiling: i64,
        quota_reserve: i64,
    ) -> Self {
        let channels: Arc<dyn ChannelRepository> =
            Arc::new(SqliteChannelRepository::new(pool.clone()));
        let quota = Arc::new(QuotaTracker::new(
            Arc::new(SqliteQuotaRepository::new(pool.clone())),
            quota_ceiling,
            quota_reserve,
        ));
        let alerting = AlertingService::new(
            Arc::new(SqliteAlertRepository::new(pool.clone())),
            event_bus.clone(),
            config.failure_rate_threshold,
            config.failure_rate_min_channels,
            config.quota_warning_fraction,
        );

        Self {
            locks: Arc::new(LockManager::new(pool.clone(), config.lock_timeout)),
            health: HealthTracker::new(channels.clone()),
            subscriptions: Arc::new(SqliteSubscriptionRepository::new(pool.clone())),
            videos: Arc::new(SqliteVideoRepository::new(pool.clone())),
            history: Arc::new(SqliteSyncHistoryRepository::new(pool.clone())),
            channels,
            quota,
            alerting,
            event_bus,
            platform,
            pool,
            config,
        }
    }

    /// Attach a webhook sink to the alerting pipeline
    pub fn with_webhook(mut self, webhook: crate::alerting::WebhookNotifier) -> Self {
        self.alerting = self.alerting.with_webhook(webhook);
        self
    }

    /// The lock manager, shared with the status service
    pub fn locks(&self) -> Arc<LockManager> {
        self.locks.clone()
    }

    /// The quota tracker, shared with maintenance jobs
    pub fn quota(&self) -> Arc<QuotaTracker> {
        self.quota.clone()
    }

    // =========================================================================
    // Shared skeleton
    // =========================================================================

    /// Acquire the user's lock; busy is an immediate rejection, never a wait
    async fn acquire_or_busy(&self, user_id: &str) -> Result<LockId> {
        self.locks
            .acquire(user_id)
            .await?
            .ok_or_else(|| SyncError::LockBusy {
                user_id: user_id.to_string(),
            })
    }

    /// Turn a quota admission denial into an error the caller surfaces
    async fn admit_quota(&self, estimated_units: i64) -> Result<()> {
        if let QuotaDecision::Denied { reason, .. } =
            self.quota.check_admission(estimated_units).await?
        {
            return Err(SyncError::QuotaExhausted { reason });
        }
        Ok(())
    }

    /// Acquire the lock and check admission; both failures are immediate
    /// rejections surfaced to the caller without touching progress.
    async fn admit(&self, user_id: &str, estimated_units: i64) -> Result<LockId> {
        let lock_id = self.acquire_or_busy(user_id).await?;
        if let Err(e) = self.admit_quota(estimated_units).await {
            self.release_quietly(user_id, &lock_id).await;
            return Err(e);
        }
        Ok(lock_id)
    }

    async fn release_quietly(&self, user_id: &str, lock_id: &LockId) {
        if let Err(e) = self.locks.release(user_id, Some(lock_id)).await {
            warn!(user_id, error = %e, "Lock release failed");
        }
    }

    /// Convert an inner failure into a terminal progress state, record the
    /// failed run, and raise a sync_error alert.
    async fn fail_run(
        &self,
        tracker: &mut ProgressTracker,
        user_id: &str,
        sync_type: &str,
        error: &SyncError,
    ) {
        let message = error.to_string();
        if let Err(e) = tracker.error(&message).await {
            warn!(user_id, error = %e, "Failed to persist error state");
        }

        self.record_history(tracker, user_id, sync_type, false).await;

        let analysis = RunAnalysis {
            user_id: user_id.to_string(),
            sync_type: sync_type.to_string(),
            channels_processed: tracker.stats().channels_processed,
            channels_failed: tracker.stats().channels_failed,
            died_channels: Vec::new(),
            fatal_error: Some(message.clone()),
        };
        self.analyze_quietly(&analysis).await;

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Failed {
                sync_id: tracker.sync_id().to_string(),
                message,
                channels_processed: tracker.stats().channels_processed as u64,
            }))
            .ok();
    }

    async fn record_history(
        &self,
        tracker: &ProgressTracker,
        user_id: &str,
        sync_type: &str,
        success: bool,
    ) {
        let stats = tracker.stats();
        let entry = NewSyncHistoryEntry {
            user_id: user_id.to_string(),
            sync_type: sync_type.to_string(),
            success,
            channels_processed: stats.channels_processed,
            channels_failed: stats.channels_failed,
            videos_added: stats.videos_added,
            quota_units_used: stats.quota_units_used,
            started_at: tracker.started_at(),
            finished_at: chrono::Utc::now().timestamp(),
        };
        if let Err(e) = self.history.record(entry).await {
            warn!(user_id, error = %e, "Failed to record sync history");
        }
    }

    /// Alert analysis must never fail the run it analyzes
    async fn analyze_quietly(&self, analysis: &RunAnalysis) {
        let quota_status = match self.quota.status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Quota status unavailable for alert analysis");
                return;
            }
        };
        if let Err(e) = self.alerting.analyze_run(analysis, quota_status).await {
            warn!(error = %e, "Alert analysis failed");
        }
    }

    fn emit_completed(&self, tracker: &ProgressTracker) {
        let stats = tracker.stats();
        let duration = (chrono::Utc::now().timestamp() - tracker.started_at()).max(0);
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Completed {
                sync_id: tracker.sync_id().to_string(),
                channels_processed: stats.channels_processed as u64,
                channels_failed: stats.channels_failed as u64,
                videos_added: stats.videos_added as u64,
                duration_secs: duration as u64,
            }))
            .ok();
    }

    fn emit_started(&self, tracker: &ProgressTracker, user_id: &str, kind: &str) {
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Started {
                sync_id: tracker.sync_id().to_string(),
                user_id: user_id.to_string(),
                kind: kind.to_string(),
            }))
            .ok();
    }

    fn outcome(&self, tracker: &ProgressTracker, cancelled: bool, message: String) -> SyncOutcome {
        SyncOutcome {
            sync_id: tracker.sync_id().to_string(),
            stats: tracker.stats(),
            cancelled,
            message,
        }
    }

    // =========================================================================
    // Subscription import
    // =========================================================================

    /// Mirror the user's full subscription list.
    ///
    /// Lock-busy and quota denial surface immediately as
    /// [`SyncError::LockBusy`] / [`SyncError::QuotaExhausted`]; the lock is
    /// released on every other exit path.
    #[instrument(skip(self, auth_token))]
    pub async fn run_subscription_import(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<SyncOutcome> {
        let lock_id = self
            .admit(user_id, self.config.subscription_import_estimated_units)
            .await?;

        let result = self.subscription_import_run(user_id, auth_token).await;
        self.release_quietly(user_id, &lock_id).await;
        result
    }

    async fn subscription_import_run(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<SyncOutcome> {
        let mut tracker = ProgressTracker::start(
            self.pool.clone(),
            user_id,
            self.config.history_retention,
            0,
        )
        .await?;
        self.emit_started(&tracker, user_id, "subscriptions");

        match self.import_phases(user_id, auth_token, &mut tracker).await {
            Ok(message) => {
                self.record_history(&tracker, user_id, "subscriptions", true)
                    .await;
                self.emit_completed(&tracker);
                Ok(self.outcome(&tracker, false, message))
            }
            Err(e) => {
                self.fail_run(&mut tracker, user_id, "subscriptions", &e)
                    .await;
                Err(e)
            }
        }
    }

    async fn import_phases(
        &self,
        user_id: &str,
        auth_token: &str,
        tracker: &mut ProgressTracker,
    ) -> Result<String> {
        tracker
            .set_phase(
                SyncPhase::FetchingSubscriptions,
                Some("Fetching subscription list"),
            )
            .await?;

        let subscriptions = with_transient_retry(
            "list_subscriptions",
            self.config.transient_retries,
            self.config.retry_base_delay,
            || self.platform.list_subscriptions(auth_token),
        )
        .await?;
        tracker.add_quota_usage(subscriptions.units_cost);
        self.quota.consume(subscriptions.units_cost).await?;

        if subscriptions.data.is_empty() {
            tracker.complete(Some("No subscriptions to import")).await?;
            return Ok("No subscriptions to import".to_string());
        }

        let total = subscriptions.data.len() as i64;
        tracker.set_total(total).await?;
        tracker
            .set_phase(
                SyncPhase::FetchingChannelDetails,
                Some("Resolving channel details"),
            )
            .await?;

        // Detail resolution failure is tolerated: channels without an
        // uploads playlist are just skipped during the video phase.
        let channel_ids: Vec<String> = subscriptions
            .data
            .iter()
            .map(|s| s.channel_id.clone())
            .collect();
        let details: HashMap<String, ChannelDetails> = match with_transient_retry(
            "get_channel_details",
            self.config.transient_retries,
            self.config.retry_base_delay,
            || self.platform.get_channel_details(&channel_ids),
        )
        .await
        {
            Ok(response) => {
                tracker.add_quota_usage(response.units_cost);
                self.quota.consume(response.units_cost).await?;
                response
                    .data
                    .into_iter()
                    .map(|d| (d.channel_id.clone(), d))
                    .collect()
            }
            Err(e) => {
                warn!(user_id, error = %e, "Channel detail resolution failed, continuing with partial data");
                HashMap::new()
            }
        };

        tracker
            .set_phase(SyncPhase::Completing, Some("Saving channels"))
            .await?;

        // Imported channels are never auto-assigned to a group; the link
        // upsert leaves existing rows untouched.
        for subscription in &subscriptions.data {
            let detail = details.get(&subscription.channel_id);
            let channel = self
                .channels
                .upsert(&NewChannel {
                    external_id: subscription.channel_id.clone(),
                    title: subscription.title.clone(),
                    thumbnail_url: subscription.thumbnail_url.clone(),
                    uploads_playlist_id: detail.and_then(|d| d.uploads_playlist_id.clone()),
                })
                .await?;
            self.subscriptions.link(user_id, &channel.id).await?;
            tracker
                .channel_processed(0, Some(&subscription.channel_id))
                .await?;
        }

        let message = format!("Imported {} subscriptions", total);
        tracker.complete(Some(&message)).await?;
        info!(user_id, total, "Subscription import complete");
        Ok(message)
    }

    // =========================================================================
    // Video sync
    // =========================================================================

    /// Import recent videos for the user's subscribed channels.
    #[instrument(skip(self, options))]
    pub async fn run_video_sync(
        &self,
        user_id: &str,
        options: VideoSyncOptions,
    ) -> Result<SyncOutcome> {
        let lock_id = self.acquire_or_busy(user_id).await?;
        let result = self.video_sync_locked(user_id, &lock_id, &options).await;
        self.release_quietly(user_id, &lock_id).await;
        result
    }

    /// The queue is read under the lock, so a concurrent revive or
    /// subscribe cannot land in a stale eligibility snapshot.
    async fn video_sync_locked(
        &self,
        user_id: &str,
        lock_id: &LockId,
        options: &VideoSyncOptions,
    ) -> Result<SyncOutcome> {
        let queue = self.eligible_channels(user_id, options).await?;
        let estimate = queue.len() as i64 * self.config.units_per_channel_estimate;
        self.admit_quota(estimate).await?;
        self.video_sync_run(user_id, lock_id, queue, options).await
    }

    /// Subscribed channels that are syncable: not dead, with a known
    /// uploads playlist.
    async fn eligible_channels(
        &self,
        user_id: &str,
        options: &VideoSyncOptions,
    ) -> Result<Vec<Channel>> {
        let all = match &options.channel_ids {
            Some(ids) => {
                let mut channels = Vec::with_capacity(ids.len());
                for id in ids {
                    match self.channels.get(id).await? {
                        Some(channel) => channels.push(channel),
                        None => return Err(SyncError::NotFound(format!("channel {}", id))),
                    }
                }
                channels
            }
            None => self.channels.list_for_user(user_id).await?,
        };

        let mut eligible = Vec::with_capacity(all.len());
        for channel in all {
            let status = channel.health().unwrap_or(HealthStatus::Dead);
            if status.is_dead() {
                debug!(channel_id = %channel.id, "Skipping dead channel");
                continue;
            }
            if channel.uploads_playlist_id.is_none() {
                debug!(channel_id = %channel.id, "Skipping channel without uploads playlist");
                continue;
            }
            eligible.push(channel);
        }
        Ok(eligible)
    }

    async fn video_sync_run(
        &self,
        user_id: &str,
        lock_id: &LockId,
        queue: Vec<Channel>,
        options: &VideoSyncOptions,
    ) -> Result<SyncOutcome> {
        let mut tracker = ProgressTracker::start(
            self.pool.clone(),
            user_id,
            self.config.history_retention,
            queue.len() as i64,
        )
        .await?;
        self.emit_started(&tracker, user_id, "videos");

        match self
            .video_phases(user_id, lock_id, &queue, options, &mut tracker)
            .await
        {
            Ok((cancelled, died)) => {
                let stats = tracker.stats();
                let analysis = RunAnalysis {
                    user_id: user_id.to_string(),
                    sync_type: "videos".to_string(),
                    channels_processed: stats.channels_processed,
                    channels_failed: stats.channels_failed,
                    died_channels: died,
                    fatal_error: None,
                };
                self.analyze_quietly(&analysis).await;
                self.record_history(&tracker, user_id, "videos", !cancelled)
                    .await;

                let message = if cancelled {
                    format!("Cancelled after {} channels", stats.channels_processed)
                } else {
                    format!(
                        "Synced {} channels, {} videos added, {} failed",
                        stats.channels_processed, stats.videos_added, stats.channels_failed
                    )
                };
                tracker.complete(Some(&message)).await?;

                if cancelled {
                    self.event_bus
                        .emit(CoreEvent::Sync(SyncEvent::Cancelled {
                            sync_id: tracker.sync_id().to_string(),
                            channels_processed: stats.channels_processed as u64,
                        }))
                        .ok();
                } else {
                    self.emit_completed(&tracker);
                }
                Ok(self.outcome(&tracker, cancelled, message))
            }
            Err(e) => {
                self.fail_run(&mut tracker, user_id, "videos", &e).await;
                Err(e)
            }
        }
    }

    /// The per-channel loop. Returns whether the run was cancelled and the
    /// channels that crossed into dead.
    async fn video_phases(
        &self,
        user_id: &str,
        lock_id: &LockId,
        queue: &[Channel],
        options: &VideoSyncOptions,
        tracker: &mut ProgressTracker,
    ) -> Result<(bool, Vec<(String, String)>)> {
        tracker
            .set_queued_channels(queue.iter().map(|c| c.id.clone()).collect())
            .await?;
        tracker
            .set_phase(SyncPhase::SyncingVideos, Some("Syncing channel videos"))
            .await?;

        let max_videos = options.max_videos.unwrap_or(self.config.default_max_videos);
        let mut died = Vec::new();
        let mut cancelled = false;

        for (index, channel) in queue.iter().enumerate() {
            // Cancellation is polled at channel boundaries only, never
            // mid-call.
            if self.locks.is_cancelled(user_id, lock_id).await {
                info!(user_id, "Cancellation observed, stopping channel loop");
                cancelled = true;
                break;
            }

            if index > 0 && index % self.config.heartbeat_every_channels == 0 {
                if let Err(e) = self.locks.extend(user_id, lock_id).await {
                    warn!(user_id, error = %e, "Lock heartbeat failed");
                }
            }

            match self
                .sync_one_channel(user_id, channel, max_videos, options.include_live)
                .await
            {
                Ok(report) => {
                    tracker.add_quota_usage(report.units_cost);
                    self.health.record_success(&channel.id).await?;
                    tracker
                        .channel_processed(report.videos_added, Some(&channel.id))
                        .await?;
                }
                Err(ChannelSyncFailure::QuotaExhausted(message)) => {
                    tracker
                        .channel_failed(
                            SyncErrorEntry::new("QUOTA_EXHAUSTED", &message)
                                .with_channel(&channel.external_id),
                        )
                        .await?;
                    warn!(user_id, "Quota exhausted mid-run, stopping channel loop");
                    break;
                }
                Err(ChannelSyncFailure::Fetch(message)) => {
                    let outcome = self.health.record_failure(&channel.id, &message).await?;
                    if outcome.became_dead {
                        died.push((channel.id.clone(), channel.title.clone()));
                    }
                    tracker
                        .channel_failed(
                            SyncErrorEntry::new("CHANNEL_FETCH_FAILED", &message)
                                .with_channel(&channel.external_id),
                        )
                        .await?;
                }
                Err(ChannelSyncFailure::Store(e)) => return Err(e),
            }

            self.event_bus
                .emit(CoreEvent::Sync(SyncEvent::Progress {
                    sync_id: tracker.sync_id().to_string(),
                    current: tracker.current() as u64,
                    total: tracker.total() as u64,
                    phase: tracker.phase().to_string(),
                }))
                .ok();
        }

        Ok((cancelled, died))
    }

    /// Fetch and upsert one channel's videos. Provider failures come back
    /// as isolated `ChannelSyncFailure`s; store failures abort the run.
    async fn sync_one_channel(
        &self,
        user_id: &str,
        channel: &Channel,
        max_videos: u32,
        include_live: bool,
    ) -> std::result::Result<ChannelSyncReport, ChannelSyncFailure> {
        let playlist = channel
            .uploads_playlist_id
            .as_deref()
            .ok_or_else(|| ChannelSyncFailure::Fetch("missing uploads playlist".to_string()))?;

        let options = VideoListOptions {
            max_items: max_videos,
            include_live,
        };
        let response = with_transient_retry(
            "list_channel_videos",
            self.config.transient_retries,
            self.config.retry_base_delay,
            || self.platform.list_channel_videos(playlist, options),
        )
        .await
        .map_err(|e| {
            if e.is_quota_exhausted() {
                ChannelSyncFailure::QuotaExhausted(e.to_string())
            } else {
                ChannelSyncFailure::Fetch(e.to_string())
            }
        })?;

        if let Err(e) = self.quota.consume(response.units_cost).await {
            return Err(ChannelSyncFailure::Store(e));
        }

        let mut added = 0;
        for video in response.data {
            let inserted = self
                .videos
                .insert_new(
                    user_id,
                    &NewVideo {
                        channel_id: channel.id.clone(),
                        external_id: video.video_id,
                        title: video.title,
                        thumbnail_url: video.thumbnail_url,
                        duration_seconds: video.duration_seconds,
                        is_short: video.duration_seconds <= self.config.shorts_max_seconds,
                        published_at: video.published_at,
                    },
                )
                .await
                .map_err(|e| ChannelSyncFailure::Store(e.into()))?;
            if inserted {
                added += 1;
            }
        }
        Ok(ChannelSyncReport {
            videos_added: added,
            units_cost: response.units_cost,
        })
    }

    // =========================================================================
    // Single-channel add
    // =========================================================================

    /// Subscribe the user to one channel and optionally import its backlog.
    #[instrument(skip(self))]
    pub async fn add_channel(
        &self,
        user_id: &str,
        channel_external_id: &str,
        mode: ImportMode,
    ) -> Result<SyncOutcome> {
        let lock_id = self
            .admit(user_id, self.config.units_per_channel_estimate)
            .await?;
        let result = self
            .add_channel_run(user_id, channel_external_id, mode)
            .await;
        self.release_quietly(user_id, &lock_id).await;
        result
    }

    async fn add_channel_run(
        &self,
        user_id: &str,
        channel_external_id: &str,
        mode: ImportMode,
    ) -> Result<SyncOutcome> {
        let mut tracker = ProgressTracker::start(
            self.pool.clone(),
            user_id,
            self.config.history_retention,
            1,
        )
        .await?;
        self.emit_started(&tracker, user_id, "channel");

        match self
            .add_channel_phases(user_id, channel_external_id, mode, &mut tracker)
            .await
        {
            Ok(message) => {
                self.record_history(&tracker, user_id, "channel", true).await;
                self.emit_completed(&tracker);
                Ok(self.outcome(&tracker, false, message))
            }
            Err(e) => {
                self.fail_run(&mut tracker, user_id, "channel", &e).await;
                Err(e)
            }
        }
    }

    async fn add_channel_phases(
        &self,
        user_id: &str,
        channel_external_id: &str,
        mode: ImportMode,
        tracker: &mut ProgressTracker,
    ) -> Result<String> {
        tracker
            .set_phase(
                SyncPhase::FetchingChannelDetails,
                Some("Resolving channel"),
            )
            .await?;

        let ids = vec![channel_external_id.to_string()];
        let response = with_transient_retry(
            "get_channel_details",
            self.config.transient_retries,
            self.config.retry_base_delay,
            || self.platform.get_channel_details(&ids),
        )
        .await?;
        tracker.add_quota_usage(response.units_cost);
        self.quota.consume(response.units_cost).await?;

        let detail = response
            .data
            .into_iter()
            .find(|d| d.channel_id == channel_external_id)
            .ok_or_else(|| SyncError::NotFound(format!("channel {}", channel_external_id)))?;

        let channel = self
            .channels
            .upsert(&NewChannel {
                external_id: detail.channel_id.clone(),
                title: detail
                    .title
                    .clone()
                    .unwrap_or_else(|| detail.channel_id.clone()),
                thumbnail_url: detail.thumbnail_url.clone(),
                uploads_playlist_id: detail.uploads_playlist_id.clone(),
            })
            .await?;
        self.subscriptions.link(user_id, &channel.id).await?;

        let added = match (mode, channel.uploads_playlist_id.as_deref()) {
            // New-only: no baseline exists for a fresh channel, so the
            // backlog is deliberately empty.
            (ImportMode::NewOnly, _) | (_, None) => 0,
            (ImportMode::All, Some(_)) => {
                tracker
                    .set_phase(SyncPhase::SyncingVideos, Some("Importing videos"))
                    .await?;
                let report = self
                    .sync_one_channel(user_id, &channel, u32::MAX, false)
                    .await
                    .map_err(|failure| match failure {
                        ChannelSyncFailure::QuotaExhausted(reason) => {
                            SyncError::QuotaExhausted { reason }
                        }
                        ChannelSyncFailure::Fetch(message) => {
                            SyncError::Provider(provider_youtube::YouTubeError::ApiError {
                                status_code: 0,
                                message,
                            })
                        }
                        ChannelSyncFailure::Store(e) => e,
                    })?;
                tracker.add_quota_usage(report.units_cost);
                report.videos_added
            }
        };

        tracker.channel_processed(added, Some(&channel.id)).await?;
        let message = format!("Added {} ({} videos imported)", channel.title, added);
        tracker.complete(Some(&message)).await?;
        Ok(message)
    }
}

/// What one channel's video sync produced
struct ChannelSyncReport {
    videos_added: i64,
    units_cost: i64,
}

/// Why one channel's video sync failed
enum ChannelSyncFailure {
    /// Provider says the shared daily quota is gone; stop the loop
    QuotaExhausted(String),
    /// Provider fetch failed for this channel only
    Fetch(String),
    /// Store failure; aborts the whole run
    Store(SyncError),
}
