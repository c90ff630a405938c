//! Error types for the sync engine

use provider_youtube::YouTubeError;
use thiserror::Error;

/// Sync engine errors
///
/// Expected conditions (busy, quota, single-channel failures) never cross a
/// component boundary as errors; they come back as structured results. This
/// enum covers the rest.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Another sync run holds the user's lock
    #[error("Sync already in progress for user {user_id}")]
    LockBusy { user_id: String },

    /// Quota admission denied before any work began
    #[error("Quota exhausted: {reason}")]
    QuotaExhausted { reason: String },

    /// The run was cancelled cooperatively
    #[error("Sync cancelled")]
    Cancelled,

    /// Provider call failed terminally (retries exhausted or non-retriable)
    #[error("Provider error: {0}")]
    Provider(#[from] YouTubeError),

    /// Persistence error from the store layer
    #[error("Store error: {0}")]
    Store(#[from] core_store::StoreError),

    /// Raw database error (lock/progress tables)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Progress state serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Illegal progress phase transition
    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl SyncError {
    /// Whether this is an admission rejection the caller should surface
    /// as "try again later" rather than a failure.
    pub fn is_admission_rejection(&self) -> bool {
        matches!(
            self,
            SyncError::LockBusy { .. } | SyncError::QuotaExhausted { .. }
        )
    }
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
