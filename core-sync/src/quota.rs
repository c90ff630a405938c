//! # Quota Tracker
//!
//! Budgets provider calls against the shared daily allowance.
//!
//! ## Overview
//!
//! The counter itself lives in the store and is incremented with a guarded
//! single-statement update, so concurrent consumers cannot push usage past
//! the ceiling. This module adds the day-key boundary (the provider resets
//! at midnight Pacific, a fixed UTC-7 offset), the admission decision made
//! before a run starts, and an optional reserve buffer withheld from
//! real-time use.

use crate::Result;
use chrono::{DateTime, Duration, Utc};
use core_store::repositories::QuotaRepository;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Offset from UTC to the provider's quota-reset wall clock
const RESET_OFFSET_HOURS: i64 = 7;

/// Snapshot of today's budget
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuotaStatus {
    pub used: i64,
    pub ceiling: i64,
    pub remaining: i64,
    pub percent_used: f64,
}

/// Admission decision for an estimated spend
#[derive(Debug, Clone, PartialEq)]
pub enum QuotaDecision {
    Allowed(QuotaStatus),
    Denied { reason: String, status: QuotaStatus },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed(_))
    }

    pub fn status(&self) -> QuotaStatus {
        match self {
            QuotaDecision::Allowed(status) => *status,
            QuotaDecision::Denied { status, .. } => *status,
        }
    }
}

/// Daily quota tracker shared across all users
pub struct QuotaTracker {
    repo: Arc<dyn QuotaRepository>,
    ceiling: i64,
    reserve: i64,
}

impl QuotaTracker {
    pub fn new(repo: Arc<dyn QuotaRepository>, ceiling: i64, reserve: i64) -> Self {
        Self {
            repo,
            ceiling,
            reserve,
        }
    }

    /// The quota day containing the given instant
    pub fn day_key_at(instant: DateTime<Utc>) -> String {
        (instant - Duration::hours(RESET_OFFSET_HOURS))
            .format("%Y-%m-%d")
            .to_string()
    }

    fn day_key() -> String {
        Self::day_key_at(Utc::now())
    }

    async fn status_for(&self, day: &str) -> Result<QuotaStatus> {
        let used = self.repo.usage_for_day(day).await?;
        let remaining = (self.ceiling - used).max(0);
        let percent_used = if self.ceiling > 0 {
            used as f64 / self.ceiling as f64
        } else {
            1.0
        };
        Ok(QuotaStatus {
            used,
            ceiling: self.ceiling,
            remaining,
            percent_used,
        })
    }

    /// Today's budget snapshot
    pub async fn status(&self) -> Result<QuotaStatus> {
        self.status_for(&Self::day_key()).await
    }

    /// Decide whether an estimated spend may start.
    ///
    /// Denials are synchronous and final for this attempt; the core never
    /// retries an admission decision. The reserve buffer is withheld here
    /// but not from `consume`, so an admitted run that slightly overshoots
    /// its estimate can still account its real spend.
    pub async fn check_admission(&self, estimated_units: i64) -> Result<QuotaDecision> {
        let status = self.status_for(&Self::day_key()).await?;
        let effective_ceiling = self.ceiling - self.reserve;

        if status.used + estimated_units > effective_ceiling {
            let reason = format!(
                "estimated {} units would exceed the daily allowance ({} of {} used)",
                estimated_units, status.used, effective_ceiling
            );
            debug!(estimated_units, used = status.used, "Quota admission denied");
            return Ok(QuotaDecision::Denied { reason, status });
        }

        Ok(QuotaDecision::Allowed(status))
    }

    /// Record actual spend. Returns `false` when the ceiling refused the
    /// increment; callers should stop launching provider calls.
    pub async fn consume(&self, units: i64) -> Result<bool> {
        if units <= 0 {
            return Ok(true);
        }
        let day = Self::day_key();
        let recorded = self.repo.try_consume(&day, units, self.ceiling).await?;
        if !recorded {
            warn!(units, day, "Quota ceiling reached, spend not recorded");
        }
        Ok(recorded)
    }
}
