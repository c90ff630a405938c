//! YouTube Data API v3 connector implementation
//!
//! Implements the `VideoPlatform` trait against the real API.

use crate::error::{Result, YouTubeError};
use crate::platform::{
    ChannelDetails, PlatformResponse, SubscriptionItem, VideoItem, VideoListOptions, VideoPlatform,
};
use crate::types::{
    parse_iso8601_duration, ApiErrorResponse, ChannelListResponse, PlaylistItemListResponse,
    SubscriptionListResponse, VideoListResponse,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// YouTube Data API base URL
const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Maximum results per page (YouTube Data API limit)
const MAX_PAGE_SIZE: u32 = 50;

/// Maximum ids per channels.list / videos.list call
const MAX_IDS_PER_CALL: usize = 50;

/// Quota units charged per list call
const UNITS_PER_LIST_CALL: i64 = 1;

/// YouTube Data API v3 connector
///
/// Subscription listing uses the caller's OAuth token; channel and playlist
/// reads use the configured API key. Every response carries the quota units
/// the call consumed (one unit per list page under the current pricing).
pub struct YouTubeConnector {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl YouTubeConnector {
    /// Create a new connector with the given API key
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: YOUTUBE_API_BASE.to_string(),
        }
    }

    /// Override the API base URL (test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Parse RFC 3339 timestamp to Unix timestamp
    fn parse_timestamp(rfc3339: &str) -> Option<i64> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).timestamp())
    }

    /// Map a non-success response to the error taxonomy.
    ///
    /// The Google error envelope carries a `reason` that distinguishes quota
    /// exhaustion from ordinary 403s; rate limiting and 5xx stay transient.
    async fn error_from_response(
        response: reqwest::Response,
        resource: &str,
    ) -> YouTubeError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if let Ok(envelope) = serde_json::from_str::<ApiErrorResponse>(&body) {
            let reason = envelope
                .error
                .errors
                .first()
                .map(|e| e.reason.as_str())
                .unwrap_or("");
            match reason {
                "quotaExceeded" | "dailyLimitExceeded" => {
                    return YouTubeError::QuotaExhausted(envelope.error.message)
                }
                "rateLimitExceeded" | "userRateLimitExceeded" => return YouTubeError::RateLimited,
                _ => {}
            }
            if status == 401 {
                return YouTubeError::AuthenticationFailed(envelope.error.message);
            }
            if status == 404 {
                return YouTubeError::NotFound {
                    resource: resource.to_string(),
                };
            }
            return YouTubeError::ApiError {
                status_code: status,
                message: envelope.error.message,
            };
        }

        match status {
            401 => YouTubeError::AuthenticationFailed("invalid credentials".to_string()),
            404 => YouTubeError::NotFound {
                resource: resource.to_string(),
            },
            429 => YouTubeError::RateLimited,
            _ => YouTubeError::ApiError {
                status_code: status,
                message: body,
            },
        }
    }

    /// Execute a GET and deserialize the JSON body
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        bearer_token: Option<&str>,
        resource: &str,
    ) -> Result<T> {
        let mut request = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(30))
            .header("Accept", "application/json");

        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let error = Self::error_from_response(response, resource).await;
            warn!(%url, %error, "API request failed");
            return Err(error);
        }

        debug!(%url, "API request succeeded");
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| YouTubeError::ParseError(format!("{}: {}", resource, e)))
    }

    /// Resolve durations and snippet details for a batch of video ids
    async fn fetch_video_details(
        &self,
        video_ids: &[String],
    ) -> Result<PlatformResponse<HashMap<String, VideoItem>>> {
        let mut details = HashMap::new();
        let mut units_cost = 0;

        for chunk in video_ids.chunks(MAX_IDS_PER_CALL) {
            let url = format!(
                "{}/videos?part=snippet,contentDetails&id={}&key={}",
                self.base_url,
                chunk.join(","),
                urlencoding::encode(&self.api_key)
            );
            let response: VideoListResponse = self.get_json(url, None, "videos").await?;
            units_cost += UNITS_PER_LIST_CALL;

            for video in response.items {
                let snippet = video.snippet;
                let duration_seconds = video
                    .content_details
                    .and_then(|cd| cd.duration)
                    .and_then(|d| parse_iso8601_duration(&d))
                    .unwrap_or(0);

                let (title, thumbnail_url, published_at, live) = match snippet {
                    Some(s) => (
                        s.title,
                        s.thumbnails.best_url(),
                        s.published_at.as_deref().and_then(Self::parse_timestamp),
                        s.live_broadcast_content
                            .map(|c| c == "live" || c == "upcoming")
                            .unwrap_or(false),
                    ),
                    None => (String::new(), None, None, false),
                };

                details.insert(
                    video.id.clone(),
                    VideoItem {
                        video_id: video.id,
                        title,
                        thumbnail_url,
                        duration_seconds,
                        published_at,
                        is_live_or_upcoming: live,
                    },
                );
            }
        }

        Ok(PlatformResponse::new(details, units_cost))
    }
}

#[async_trait]
impl VideoPlatform for YouTubeConnector {
    #[instrument(skip(self, auth_token))]
    async fn list_subscriptions(
        &self,
        auth_token: &str,
    ) -> Result<PlatformResponse<Vec<SubscriptionItem>>> {
        info!("Listing subscriptions");

        let mut items = Vec::new();
        let mut units_cost = 0;
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/subscriptions?part=snippet&mine=true&maxResults={}",
                self.base_url, MAX_PAGE_SIZE
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let response: SubscriptionListResponse = self
                .get_json(url, Some(auth_token), "subscriptions")
                .await?;
            units_cost += UNITS_PER_LIST_CALL;

            for item in response.items {
                items.push(SubscriptionItem {
                    channel_id: item.snippet.resource_id.channel_id,
                    title: item.snippet.title,
                    thumbnail_url: item.snippet.thumbnails.best_url(),
                });
            }

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!(count = items.len(), units_cost, "Listed subscriptions");
        Ok(PlatformResponse::new(items, units_cost))
    }

    #[instrument(skip(self, channel_ids), fields(count = channel_ids.len()))]
    async fn get_channel_details(
        &self,
        channel_ids: &[String],
    ) -> Result<PlatformResponse<Vec<ChannelDetails>>> {
        info!("Resolving channel details");

        let mut details = Vec::new();
        let mut units_cost = 0;

        for chunk in channel_ids.chunks(MAX_IDS_PER_CALL) {
            let url = format!(
                "{}/channels?part=snippet,contentDetails&id={}&maxResults={}&key={}",
                self.base_url,
                chunk.join(","),
                MAX_PAGE_SIZE,
                urlencoding::encode(&self.api_key)
            );

            let response: ChannelListResponse = self.get_json(url, None, "channels").await?;
            units_cost += UNITS_PER_LIST_CALL;

            for channel in response.items {
                let uploads_playlist_id = channel
                    .content_details
                    .and_then(|cd| cd.related_playlists)
                    .and_then(|rp| rp.uploads);
                let (title, thumbnail_url) = match channel.snippet {
                    Some(s) => (Some(s.title), s.thumbnails.best_url()),
                    None => (None, None),
                };
                details.push(ChannelDetails {
                    channel_id: channel.id,
                    title,
                    thumbnail_url,
                    uploads_playlist_id,
                });
            }
        }

        info!(resolved = details.len(), units_cost, "Resolved channel details");
        Ok(PlatformResponse::new(details, units_cost))
    }

    #[instrument(skip(self), fields(playlist = %uploads_playlist_id))]
    async fn list_channel_videos(
        &self,
        uploads_playlist_id: &str,
        options: VideoListOptions,
    ) -> Result<PlatformResponse<Vec<VideoItem>>> {
        info!(max_items = options.max_items, "Listing channel videos");

        let mut ordered_ids = Vec::new();
        let mut published: HashMap<String, Option<i64>> = HashMap::new();
        let mut units_cost = 0;
        let mut page_token: Option<String> = None;

        while (ordered_ids.len() as u32) < options.max_items {
            let remaining = options.max_items - ordered_ids.len() as u32;
            let mut url = format!(
                "{}/playlistItems?part=contentDetails&playlistId={}&maxResults={}&key={}",
                self.base_url,
                urlencoding::encode(uploads_playlist_id),
                remaining.min(MAX_PAGE_SIZE),
                urlencoding::encode(&self.api_key)
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let response: PlaylistItemListResponse =
                self.get_json(url, None, uploads_playlist_id).await?;
            units_cost += UNITS_PER_LIST_CALL;

            for item in response.items {
                published.insert(
                    item.content_details.video_id.clone(),
                    item.content_details
                        .video_published_at
                        .as_deref()
                        .and_then(Self::parse_timestamp),
                );
                ordered_ids.push(item.content_details.video_id);
            }

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        let details = self.fetch_video_details(&ordered_ids).await?;
        units_cost += details.units_cost;

        let mut videos = Vec::new();
        for id in &ordered_ids {
            if let Some(mut video) = details.data.get(id).cloned() {
                if video.is_live_or_upcoming && !options.include_live {
                    continue;
                }
                // playlistItems carries the upload time even when the video
                // snippet omits it.
                if video.published_at.is_none() {
                    video.published_at = published.get(id).cloned().flatten();
                }
                videos.push(video);
            }
        }

        info!(count = videos.len(), units_cost, "Listed channel videos");
        Ok(PlatformResponse::new(videos, units_cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        let ts = YouTubeConnector::parse_timestamp("2024-01-01T00:00:00Z");
        assert_eq!(ts, Some(1_704_067_200));
        assert_eq!(YouTubeConnector::parse_timestamp("not-a-date"), None);
    }

    #[tokio::test]
    async fn test_error_from_quota_envelope() {
        let body = r#"{
            "error": {
                "code": 403,
                "message": "Quota exceeded for quota metric 'queries'",
                "errors": [ { "reason": "quotaExceeded" } ]
            }
        }"#;
        let response = http::Response::builder()
            .status(403)
            .body(body.to_string())
            .unwrap();
        let error =
            YouTubeConnector::error_from_response(reqwest::Response::from(response), "channels")
                .await;
        assert!(error.is_quota_exhausted());
    }

    #[tokio::test]
    async fn test_error_from_not_found() {
        let response = http::Response::builder()
            .status(404)
            .body("gone".to_string())
            .unwrap();
        let error =
            YouTubeConnector::error_from_response(reqwest::Response::from(response), "UUdead")
                .await;
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_error_from_server_failure_is_transient() {
        let response = http::Response::builder()
            .status(503)
            .body("backend error".to_string())
            .unwrap();
        let error =
            YouTubeConnector::error_from_response(reqwest::Response::from(response), "channels")
                .await;
        assert!(error.is_transient());
    }
}
