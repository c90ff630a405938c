//! Domain models for the subscription library
//!
//! This module contains the persisted entities with database mapping and the
//! closed enums used across the sync engine.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Health Status
// =============================================================================

/// Channel health derived from consecutive fetch failures.
///
/// The status is a deterministic function of the failure count; any success
/// resets the counter and the status to `Healthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fewer than 2 consecutive failures
    Healthy,
    /// 2-4 consecutive failures
    Warning,
    /// 5-9 consecutive failures
    Unhealthy,
    /// 10 or more consecutive failures; excluded from sync until revived
    Dead,
}

impl HealthStatus {
    /// Derive the status from a consecutive-failure count.
    pub fn from_consecutive_failures(failures: u32) -> Self {
        match failures {
            0..=1 => HealthStatus::Healthy,
            2..=4 => HealthStatus::Warning,
            5..=9 => HealthStatus::Unhealthy,
            _ => HealthStatus::Dead,
        }
    }

    /// Whether the channel should be skipped during automatic sync.
    pub fn is_dead(&self) -> bool {
        matches!(self, HealthStatus::Dead)
    }

    /// Whether the channel is in a degraded state worth surfacing.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, HealthStatus::Healthy)
    }

    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Dead => "dead",
        }
    }
}

impl FromStr for HealthStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(HealthStatus::Healthy),
            "warning" => Ok(HealthStatus::Warning),
            "unhealthy" => Ok(HealthStatus::Unhealthy),
            "dead" => Ok(HealthStatus::Dead),
            _ => Err(StoreError::InvalidInput {
                field: "health_status".to_string(),
                message: format!("Unknown health status: {}", s),
            }),
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Activity Level
// =============================================================================

/// Publishing cadence classification, maintained by a periodic job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    /// At least 2 videos/week or 8/month
    High,
    /// At least 1 video/week or 4/month
    Medium,
    /// Anything below
    Low,
}

impl ActivityLevel {
    /// Classify from recent publish counts.
    pub fn from_recent_counts(videos_last_week: u32, videos_last_month: u32) -> Self {
        if videos_last_week >= 2 || videos_last_month >= 8 {
            ActivityLevel::High
        } else if videos_last_week >= 1 || videos_last_month >= 4 {
            ActivityLevel::Medium
        } else {
            ActivityLevel::Low
        }
    }

    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::High => "high",
            ActivityLevel::Medium => "medium",
            ActivityLevel::Low => "low",
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(ActivityLevel::High),
            "medium" => Ok(ActivityLevel::Medium),
            "low" => Ok(ActivityLevel::Low),
            _ => Err(StoreError::InvalidInput {
                field: "activity_level".to_string(),
                message: format!("Unknown activity level: {}", s),
            }),
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Alert Types
// =============================================================================

/// Category of a stored alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighFailureRate,
    ChannelDied,
    QuotaWarning,
    QuotaExhausted,
    SyncError,
}

impl AlertType {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::HighFailureRate => "high_failure_rate",
            AlertType::ChannelDied => "channel_died",
            AlertType::QuotaWarning => "quota_warning",
            AlertType::QuotaExhausted => "quota_exhausted",
            AlertType::SyncError => "sync_error",
        }
    }
}

impl FromStr for AlertType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high_failure_rate" => Ok(AlertType::HighFailureRate),
            "channel_died" => Ok(AlertType::ChannelDied),
            "quota_warning" => Ok(AlertType::QuotaWarning),
            "quota_exhausted" => Ok(AlertType::QuotaExhausted),
            "sync_error" => Ok(AlertType::SyncError),
            _ => Err(StoreError::InvalidInput {
                field: "alert_type".to_string(),
                message: format!("Unknown alert type: {}", s),
            }),
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of a stored alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlertSeverity {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Error => "error",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl FromStr for AlertSeverity {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(AlertSeverity::Info),
            "warning" => Ok(AlertSeverity::Warning),
            "error" => Ok(AlertSeverity::Error),
            "critical" => Ok(AlertSeverity::Critical),
            _ => Err(StoreError::InvalidInput {
                field: "severity".to_string(),
                message: format!("Unknown severity: {}", s),
            }),
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Persisted Entities
// =============================================================================

/// A mirrored channel, shared across every user subscribed to it.
///
/// Health fields live here on purpose: failures are a property of the
/// channel, not of the user whose sync observed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Channel {
    /// Internal identifier
    pub id: String,
    /// The provider's channel identifier
    pub external_id: String,
    /// Channel title
    pub title: String,
    /// Thumbnail URL from the provider
    pub thumbnail_url: Option<String>,
    /// The provider's handle for enumerating uploads (distinct from
    /// `external_id`); channels without one are skipped during video sync
    pub uploads_playlist_id: Option<String>,

    // Health tracking
    /// Consecutive fetch failures
    pub consecutive_failures: i64,
    /// Derived health status string ("healthy", "warning", "unhealthy", "dead")
    pub health_status: String,
    /// Last successful fetch (Unix seconds)
    pub last_success_at: Option<i64>,
    /// Last failed fetch (Unix seconds)
    pub last_failure_at: Option<i64>,
    /// Reason recorded with the last failure
    pub last_failure_reason: Option<String>,

    /// Activity classification string ("high", "medium", "low")
    pub activity_level: String,

    /// When first imported
    pub created_at: i64,
    /// Last update time
    pub updated_at: i64,
}

impl Channel {
    /// Parse the stored health status.
    pub fn health(&self) -> Result<HealthStatus, StoreError> {
        self.health_status.parse()
    }
}

/// The data required to upsert a channel from provider output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannel {
    pub external_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub uploads_playlist_id: Option<String>,
}

/// A user's subscription link to a channel.
///
/// `group_id` stays `None` on import; assigning a group is an explicit user
/// action and never done by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub user_id: String,
    pub channel_id: String,
    pub group_id: Option<String>,
    pub created_at: i64,
}

/// A video imported for one user.
///
/// Videos are keyed by (user, external id) so the same upload can exist
/// independently per user with its own watch state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Video {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub external_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: i64,
    /// Duration at or under the shorts threshold (60 seconds)
    pub is_short: bool,
    pub published_at: Option<i64>,
    pub watched: bool,
    pub created_at: i64,
}

/// The data required to upsert a video from provider output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVideo {
    pub channel_id: String,
    pub external_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: i64,
    pub is_short: bool,
    pub published_at: Option<i64>,
}

/// An audit record of one finished sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SyncHistoryEntry {
    pub id: String,
    pub user_id: String,
    /// "subscriptions", "videos", or "channel"
    pub sync_type: String,
    pub success: bool,
    pub channels_processed: i64,
    pub channels_failed: i64,
    pub videos_added: i64,
    pub quota_units_used: i64,
    pub started_at: i64,
    pub finished_at: i64,
}

/// A stored anomaly raised by post-run analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Alert {
    pub id: String,
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub message: String,
    /// Structured JSON payload with alert-specific details
    pub data: String,
    pub acknowledged: bool,
    pub created_at: i64,
}
