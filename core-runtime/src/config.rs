//! # Core Configuration Module
//!
//! Process-level configuration for the subscription mirror service.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`CoreConfig`] instance holding the settings shared across crates. It
//! enforces fail-fast validation so a misconfigured process refuses to start
//! instead of failing mid-sync.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/var/lib/subvault/library.db")
//!     .api_key("AIza...")
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Core configuration for the subscription mirror service.
///
/// Use [`CoreConfig::builder`] to construct instances.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// API key for the external video platform
    pub api_key: String,

    /// Optional webhook endpoint for alert notifications
    pub webhook_url: Option<String>,

    /// Daily quota ceiling granted by the external provider
    pub quota_daily_ceiling: u64,

    /// Quota units withheld from real-time use
    pub quota_reserve: u64,
}

impl CoreConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// The directory containing the database file, if any.
    pub fn database_dir(&self) -> Option<&Path> {
        self.database_path.parent()
    }
}

/// Builder for [`CoreConfig`] with fail-fast validation.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    api_key: Option<String>,
    webhook_url: Option<String>,
    quota_daily_ceiling: Option<u64>,
    quota_reserve: Option<u64>,
}

impl CoreConfigBuilder {
    /// Set the SQLite database path (required).
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Set the external API key (required).
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the alert webhook endpoint.
    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    /// Set the daily quota ceiling (default 10 000 units).
    pub fn quota_daily_ceiling(mut self, units: u64) -> Self {
        self.quota_daily_ceiling = Some(units);
        self
    }

    /// Set the quota reserve buffer (default 0).
    pub fn quota_reserve(mut self, units: u64) -> Self {
        self.quota_reserve = Some(units);
        self
    }

    /// Build the configuration, validating required settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSetting`] with an actionable message when a
    /// required setting is absent, and [`Error::Config`] when a value is
    /// inconsistent (e.g., reserve larger than the ceiling).
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| Error::MissingSetting {
            setting: "database_path".to_string(),
            message: "Provide the SQLite database path via database_path(...)".to_string(),
        })?;

        let api_key = self.api_key.ok_or_else(|| Error::MissingSetting {
            setting: "api_key".to_string(),
            message: "Provide the video platform API key via api_key(...)".to_string(),
        })?;

        if api_key.trim().is_empty() {
            return Err(Error::Config("API key must not be empty".to_string()));
        }

        let quota_daily_ceiling = self.quota_daily_ceiling.unwrap_or(10_000);
        let quota_reserve = self.quota_reserve.unwrap_or(0);

        if quota_reserve >= quota_daily_ceiling {
            return Err(Error::Config(format!(
                "Quota reserve ({}) must be smaller than the daily ceiling ({})",
                quota_reserve, quota_daily_ceiling
            )));
        }

        Ok(CoreConfig {
            database_path,
            api_key,
            webhook_url: self.webhook_url,
            quota_daily_ceiling,
            quota_reserve,
        })
    }
}
