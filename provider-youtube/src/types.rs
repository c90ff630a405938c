//! YouTube Data API v3 response types
//!
//! Data structures for deserializing YouTube Data API v3 responses, plus the
//! ISO 8601 duration parser the video endpoint requires.

use serde::Deserialize;

/// Thumbnail variant (default/medium/high)
#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

/// Thumbnail set attached to most snippet payloads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    pub default: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
}

impl Thumbnails {
    /// Best available thumbnail URL, preferring medium resolution
    pub fn best_url(&self) -> Option<String> {
        self.medium
            .as_ref()
            .or(self.high.as_ref())
            .or(self.default.as_ref())
            .map(|t| t.url.clone())
    }
}

// =============================================================================
// subscriptions.list
// =============================================================================

/// See: https://developers.google.com/youtube/v3/docs/subscriptions/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionListResponse {
    #[serde(default)]
    pub items: Vec<SubscriptionResource>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionResource {
    pub snippet: SubscriptionSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnippet {
    pub title: String,
    pub resource_id: ResourceId,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub channel_id: String,
}

// =============================================================================
// channels.list
// =============================================================================

/// See: https://developers.google.com/youtube/v3/docs/channels/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<ChannelResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResource {
    pub id: String,
    pub snippet: Option<ChannelSnippet>,
    pub content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSnippet {
    pub title: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    pub related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

// =============================================================================
// playlistItems.list
// =============================================================================

/// See: https://developers.google.com/youtube/v3/docs/playlistItems/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemListResponse {
    #[serde(default)]
    pub items: Vec<PlaylistItemResource>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemResource {
    pub content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemContentDetails {
    pub video_id: String,
    pub video_published_at: Option<String>,
}

// =============================================================================
// videos.list
// =============================================================================

/// See: https://developers.google.com/youtube/v3/docs/videos/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResource {
    pub id: String,
    pub snippet: Option<VideoSnippet>,
    pub content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
    pub published_at: Option<String>,
    /// "live", "upcoming", or "none"
    #[serde(default)]
    pub live_broadcast_content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoContentDetails {
    pub duration: Option<String>,
}

// =============================================================================
// Error payloads
// =============================================================================

/// The standard Google API error envelope
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub reason: String,
}

// =============================================================================
// ISO 8601 durations
// =============================================================================

/// Parse an ISO 8601 duration such as `PT1H2M3S` into whole seconds.
///
/// YouTube emits the time designators only (no years/months). Unparseable
/// input yields `None` rather than a guess.
pub fn parse_iso8601_duration(input: &str) -> Option<i64> {
    let rest = input.strip_prefix("PT").or_else(|| {
        // Day component shows up on very long streams: P1DT2H.
        input.strip_prefix('P')
    })?;

    let mut total: i64 = 0;
    let mut number = String::new();
    let mut saw_component = false;

    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
        } else {
            let factor = match ch {
                'D' => 86_400,
                'H' => 3_600,
                'M' => 60,
                'S' => 1,
                'T' => {
                    if !number.is_empty() {
                        return None;
                    }
                    continue;
                }
                _ => return None,
            };
            let value: i64 = number.parse().ok()?;
            total += value * factor;
            number.clear();
            saw_component = true;
        }
    }

    if !number.is_empty() || !saw_component {
        return None;
    }
    Some(total)
}
