//! # Maintenance Jobs
//!
//! Periodic background work that runs outside any per-user sync lock:
//! activity reclassification and dead-channel retry probes. Both operate on
//! channel-global state, so serializing them against user syncs would buy
//! nothing.

use crate::config::SyncConfig;
use crate::health::HealthTracker;
use crate::quota::{QuotaDecision, QuotaTracker};
use crate::Result;
use core_store::models::{ActivityLevel, HealthStatus};
use core_store::repositories::{ChannelRepository, VideoRepository};
use provider_youtube::{VideoListOptions, VideoPlatform};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Probe cap: one cheap page is enough to prove a dead channel is back
const DEAD_PROBE_MAX_VIDEOS: u32 = 1;

/// Summary of one dead-channel retry batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeadRetryReport {
    /// Channels probed this batch
    pub attempted: usize,
    /// Probes that succeeded and revived the channel
    pub revived: usize,
    /// Channels skipped because their backoff window has not elapsed
    pub backed_off: usize,
}

/// Periodic maintenance over channel-global state
pub struct MaintenanceJobs {
    config: SyncConfig,
    platform: Arc<dyn VideoPlatform>,
    channels: Arc<dyn ChannelRepository>,
    videos: Arc<dyn VideoRepository>,
    quota: Arc<QuotaTracker>,
    health: HealthTracker,
}

impl MaintenanceJobs {
    pub fn new(
        config: SyncConfig,
        platform: Arc<dyn VideoPlatform>,
        channels: Arc<dyn ChannelRepository>,
        videos: Arc<dyn VideoRepository>,
        quota: Arc<QuotaTracker>,
    ) -> Self {
        Self {
            health: HealthTracker::new(channels.clone()),
            config,
            platform,
            channels,
            videos,
            quota,
        }
    }

    // =========================================================================
    // Activity reclassification
    // =========================================================================

    /// Recompute every channel's activity level from its recent publish
    /// counts. Returns how many channels changed level.
    #[instrument(skip(self))]
    pub async fn reclassify_activity(&self) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();
        let week_cutoff = now - 7 * 86_400;
        let month_cutoff = now - 30 * 86_400;

        let counts: HashMap<String, (u32, u32)> = self
            .videos
            .recent_counts_by_channel(week_cutoff, month_cutoff)
            .await?
            .into_iter()
            .map(|c| {
                (
                    c.channel_id,
                    (c.videos_last_week as u32, c.videos_last_month as u32),
                )
            })
            .collect();

        let mut changed = 0u64;
        for channel in self.channels.list_all().await? {
            let (week, month) = counts.get(&channel.id).copied().unwrap_or((0, 0));
            let level = ActivityLevel::from_recent_counts(week, month);
            if channel.activity_level != level.as_str() {
                self.channels.set_activity_level(&channel.id, level).await?;
                changed += 1;
            }
        }

        info!(changed, "Activity reclassification finished");
        Ok(changed)
    }

    // =========================================================================
    // Dead-channel retry
    // =========================================================================

    /// Probe a bounded batch of dead channels and revive the ones that
    /// answer again.
    ///
    /// Backoff scales with how far past the dead threshold a channel is, so
    /// a channel that keeps failing gets probed less and less often. A
    /// failed probe goes through the normal failure path and pushes the
    /// next attempt further out.
    #[instrument(skip(self))]
    pub async fn retry_dead_channels(&self) -> Result<DeadRetryReport> {
        let now = chrono::Utc::now().timestamp();
        let backoff_base = self.config.dead_retry_backoff.as_secs() as i64;
        let mut report = DeadRetryReport::default();

        // Probes spend from the same daily allowance as user syncs.
        let estimate =
            self.config.dead_retry_batch_size as i64 * self.config.units_per_channel_estimate;
        if let QuotaDecision::Denied { reason, .. } = self.quota.check_admission(estimate).await? {
            warn!(%reason, "Dead-channel retry batch skipped, quota denied");
            return Ok(report);
        }

        let dead = self.channels.list_by_health(HealthStatus::Dead).await?;
        for channel in dead {
            if report.attempted >= self.config.dead_retry_batch_size {
                break;
            }

            // 10 failures waits one backoff unit, 11 waits two, and so on.
            let failures_past_dead = (channel.consecutive_failures - 9).max(1);
            let wait = backoff_base * failures_past_dead;
            let eligible = channel
                .last_failure_at
                .map(|at| now - at >= wait)
                .unwrap_or(true);
            if !eligible {
                report.backed_off += 1;
                continue;
            }

            report.attempted += 1;
            if self.probe_channel(&channel.id).await? {
                report.revived += 1;
            }
        }

        info!(
            attempted = report.attempted,
            revived = report.revived,
            backed_off = report.backed_off,
            "Dead-channel retry batch finished"
        );
        Ok(report)
    }

    /// One probe attempt: re-resolve a missing uploads playlist, then fetch
    /// a single page. Success revives the channel; failure deepens it.
    async fn probe_channel(&self, channel_id: &str) -> Result<bool> {
        let channel = match self.channels.get(channel_id).await? {
            Some(channel) => channel,
            None => return Ok(false),
        };

        let playlist = match &channel.uploads_playlist_id {
            Some(playlist) => playlist.clone(),
            None => match self.resolve_uploads_playlist(&channel.id, &channel.external_id).await {
                Some(playlist) => playlist,
                None => {
                    self.health
                        .record_failure(&channel.id, "uploads playlist unresolved")
                        .await?;
                    return Ok(false);
                }
            },
        };

        match self
            .platform
            .list_channel_videos(&playlist, VideoListOptions::new(DEAD_PROBE_MAX_VIDEOS))
            .await
        {
            Ok(response) => {
                self.quota.consume(response.units_cost).await?;
                self.health.record_success(&channel.id).await?;
                info!(channel_id = %channel.id, "Dead channel answered, revived");
                Ok(true)
            }
            Err(e) => {
                debug!(channel_id = %channel.id, error = %e, "Dead channel probe failed");
                self.health.record_failure(&channel.id, &e.to_string()).await?;
                Ok(false)
            }
        }
    }

    async fn resolve_uploads_playlist(
        &self,
        channel_id: &str,
        external_id: &str,
    ) -> Option<String> {
        let ids = vec![external_id.to_string()];
        let response = match self.platform.get_channel_details(&ids).await {
            Ok(response) => response,
            Err(e) => {
                warn!(channel_id, error = %e, "Uploads playlist resolution failed");
                return None;
            }
        };
        if let Err(e) = self.quota.consume(response.units_cost).await {
            warn!(channel_id, error = %e, "Failed to record playlist resolution spend");
        }

        let playlist = response
            .data
            .into_iter()
            .find(|d| d.channel_id == external_id)
            .and_then(|d| d.uploads_playlist_id)?;

        if let Err(e) = self
            .channels
            .set_uploads_playlist(channel_id, &playlist)
            .await
        {
            warn!(channel_id, error = %e, "Failed to store resolved uploads playlist");
        }
        Some(playlist)
    }
}
