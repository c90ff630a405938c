//! The provider boundary consumed by the sync engine
//!
//! `core-sync` only sees this trait; the concrete `YouTubeConnector` (or a
//! test double) is injected behind it.

use crate::error::Result;
use async_trait::async_trait;

/// A provider response paired with the quota units the call consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformResponse<T> {
    pub data: T,
    pub units_cost: i64,
}

impl<T> PlatformResponse<T> {
    pub fn new(data: T, units_cost: i64) -> Self {
        Self { data, units_cost }
    }
}

/// One entry of the authenticated user's subscription list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionItem {
    pub channel_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
}

/// Resolved channel details, chiefly the uploads playlist handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDetails {
    pub channel_id: String,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub uploads_playlist_id: Option<String>,
}

/// One video enumerated from an uploads playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoItem {
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: i64,
    /// Unix seconds, when the provider reported one
    pub published_at: Option<i64>,
    /// Live or scheduled premiere rather than a normal upload
    pub is_live_or_upcoming: bool,
}

/// Options for listing a channel's videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoListOptions {
    /// Upper bound on items fetched from the uploads playlist
    pub max_items: u32,
    /// Keep live/scheduled entries in the result
    pub include_live: bool,
}

impl VideoListOptions {
    pub fn new(max_items: u32) -> Self {
        Self {
            max_items,
            include_live: false,
        }
    }
}

/// The external video/subscription provider.
///
/// Every call reports its quota cost; callers feed that into the shared
/// daily budget. Errors carry the transient/quota/not-found classification
/// via [`crate::YouTubeError`].
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    /// Full subscription list of the authenticated user, all pages
    async fn list_subscriptions(
        &self,
        auth_token: &str,
    ) -> Result<PlatformResponse<Vec<SubscriptionItem>>>;

    /// Resolve uploads playlist handles for the given channel ids, in bulk
    async fn get_channel_details(
        &self,
        channel_ids: &[String],
    ) -> Result<PlatformResponse<Vec<ChannelDetails>>>;

    /// Up to `options.max_items` videos from an uploads playlist, newest first
    async fn list_channel_videos(
        &self,
        uploads_playlist_id: &str,
        options: VideoListOptions,
    ) -> Result<PlatformResponse<Vec<VideoItem>>>;
}
