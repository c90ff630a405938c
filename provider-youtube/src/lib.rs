//! # YouTube Provider
//!
//! Implements the `VideoPlatform` trait for YouTube Data API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Paginated subscription listing for an authenticated user
//! - Bulk channel detail resolution (uploads playlist handles)
//! - Bounded video listing from a channel's uploads playlist
//! - Quota unit accounting attached to every response
//! - An error classifier separating transient, quota, and terminal failures

pub mod connector;
pub mod error;
pub mod platform;
pub mod types;

pub use connector::YouTubeConnector;
pub use error::{Result, YouTubeError};
pub use platform::{
    ChannelDetails, PlatformResponse, SubscriptionItem, VideoItem, VideoListOptions, VideoPlatform,
};
