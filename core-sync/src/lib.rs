//! # Background Sync Engine
//!
//! Orchestrates subscription and video synchronization against the video
//! provider.
//!
//! ## Overview
//!
//! This module manages the lifecycle of sync runs, including:
//! - Per-user mutual exclusion with cooperative cancellation
//! - Persisted, resumable progress with phase transitions and ETA
//! - Shared daily quota admission and consumption
//! - Per-channel health tracking with dead-channel retirement
//! - Post-run alerting (failure rates, quota pressure, dead channels)
//!
//! ## Components
//!
//! - **Lock Manager** (`lock`): Per-user sync locks with lazy expiry recovery
//! - **Progress Tracker** (`progress`): Phase state machine and run counters
//! - **Quota Tracker** (`quota`): Daily unit budget with admission checks
//! - **Health Tracker** (`health`): Consecutive-failure channel health
//! - **Sync Orchestrator** (`orchestrator`): End-to-end run driver
//! - **Alerting** (`alerting`): Post-run analysis and notification fan-out
//! - **Maintenance Jobs** (`jobs`): Activity reclassification, dead retries
//! - **Status Service** (`status`): Outward status, ETA, and cancellation

pub mod alerting;
pub mod config;
pub mod error;
pub mod health;
pub mod jobs;
pub mod lock;
pub mod orchestrator;
pub mod progress;
pub mod quota;
pub mod retry;
pub mod status;

pub use alerting::{AlertingService, RunAnalysis, WebhookNotifier};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use health::{FailureOutcome, HealthTracker};
pub use jobs::{DeadRetryReport, MaintenanceJobs};
pub use lock::{LockId, LockManager, SyncLock};
pub use orchestrator::{ImportMode, SyncOrchestrator, SyncOutcome, VideoSyncOptions};
pub use progress::{
    estimate_eta, EtaEstimate, ProgressReader, ProgressTracker, SyncErrorEntry, SyncPhase,
    SyncProgress, SyncStats,
};
pub use quota::{QuotaDecision, QuotaStatus, QuotaTracker};
pub use retry::with_transient_retry;
pub use status::{SyncStatus, SyncStatusService};
