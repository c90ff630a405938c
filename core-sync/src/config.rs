//! Sync engine configuration

use std::time::Duration;

/// Sync engine configuration
///
/// All knobs have production defaults; tests shrink the durations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Lock lifetime; a run that neither completes nor heartbeats within
    /// this window is presumed dead and its lock becomes acquirable
    pub lock_timeout: Duration,

    /// Progress rows older than this without an update read as "stuck"
    pub staleness_window: Duration,

    /// Delay before a cancellation request force-releases the lock
    pub cancellation_grace: Duration,

    /// Extra attempts for transient provider failures (beyond the first)
    pub transient_retries: u32,

    /// Base delay between transient retries; grows linearly per attempt
    pub retry_base_delay: Duration,

    /// Duration at or under which a video counts as a short
    pub shorts_max_seconds: i64,

    /// Progress history rows retained per user
    pub history_retention: u32,

    /// Default per-channel video cap when the caller gives none
    pub default_max_videos: u32,

    /// Extend the lock heartbeat every N channels during video sync
    pub heartbeat_every_channels: usize,

    /// Estimated quota units for a subscription import admission check
    pub subscription_import_estimated_units: i64,

    /// Estimated quota units per channel for a video sync admission check
    pub units_per_channel_estimate: i64,

    /// Failure-rate alert threshold (fraction of channels failed)
    pub failure_rate_threshold: f64,

    /// Minimum channels in a run before the failure-rate alert applies
    pub failure_rate_min_channels: i64,

    /// Quota usage fraction that triggers a warning alert
    pub quota_warning_fraction: f64,

    /// Dead channels attempted per maintenance batch
    pub dead_retry_batch_size: usize,

    /// Base backoff between dead-channel retry attempts; scales with the
    /// failure count past the dead threshold
    pub dead_retry_backoff: Duration,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn with_cancellation_grace(mut self, grace: Duration) -> Self {
        self.cancellation_grace = grace;
        self
    }

    pub fn with_transient_retries(mut self, retries: u32) -> Self {
        self.transient_retries = retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_history_retention(mut self, retention: u32) -> Self {
        self.history_retention = retention;
        self
    }

    pub fn with_default_max_videos(mut self, max: u32) -> Self {
        self.default_max_videos = max;
        self
    }

    pub fn with_failure_rate_threshold(mut self, threshold: f64) -> Self {
        self.failure_rate_threshold = threshold;
        self
    }

    pub fn with_quota_warning_fraction(mut self, fraction: f64) -> Self {
        self.quota_warning_fraction = fraction;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(30 * 60),
            staleness_window: Duration::from_secs(5 * 60),
            cancellation_grace: Duration::from_secs(60),
            transient_retries: 2,
            retry_base_delay: Duration::from_secs(1),
            shorts_max_seconds: 60,
            history_retention: 10,
            default_max_videos: 25,
            heartbeat_every_channels: 10,
            subscription_import_estimated_units: 10,
            units_per_channel_estimate: 3,
            failure_rate_threshold: 0.3,
            failure_rate_min_channels: 5,
            quota_warning_fraction: 0.8,
            dead_retry_batch_size: 10,
            dead_retry_backoff: Duration::from_secs(60 * 60),
        }
    }
}
