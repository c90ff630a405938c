//! # Event Bus System
//!
//! Event-driven notifications for the sync core using `tokio::sync::broadcast`.
//! Modules emit typed events (sync lifecycle, alerts) that any number of
//! subscribers can consume independently; slow subscribers receive
//! `RecvError::Lagged` and fast ones are never blocked.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::Started {
//!         sync_id: "sync-1".to_string(),
//!         user_id: "user-123".to_string(),
//!         kind: "subscriptions".to_string(),
//!     }))
//!     .ok();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sync-related events
    Sync(SyncEvent),
    /// Alerting events
    Alert(AlertEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Alert(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Alert(AlertEvent::Raised { .. }) => EventSeverity::Warning,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events related to synchronization runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Sync run initiated.
    Started {
        /// Unique identifier for this sync run.
        sync_id: String,
        /// The user being synced.
        user_id: String,
        /// The kind of run ("subscriptions", "videos", "channel").
        kind: String,
    },
    /// Incremental progress update during a run.
    Progress {
        /// The sync run ID.
        sync_id: String,
        /// Channels processed so far (succeeded + failed).
        current: u64,
        /// Total channels queued for this run.
        total: u64,
        /// Current phase label.
        phase: String,
    },
    /// Run finished successfully.
    Completed {
        /// The sync run ID.
        sync_id: String,
        /// Channels processed successfully.
        channels_processed: u64,
        /// Channels that failed.
        channels_failed: u64,
        /// New videos imported.
        videos_added: u64,
        /// Duration of the run in seconds.
        duration_secs: u64,
    },
    /// Run terminated with an error.
    Failed {
        /// The sync run ID.
        sync_id: String,
        /// Human-readable error message.
        message: String,
        /// Channels processed before the failure.
        channels_processed: u64,
    },
    /// Run stopped after a cancellation request was observed.
    Cancelled {
        /// The sync run ID.
        sync_id: String,
        /// Channels processed before cancellation.
        channels_processed: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::Progress { .. } => "Sync in progress",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
            SyncEvent::Cancelled { .. } => "Sync cancelled",
        }
    }
}

// ============================================================================
// Alert Events
// ============================================================================

/// Events emitted when the post-run analysis raises an alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AlertEvent {
    /// A new alert was stored.
    Raised {
        /// The alert row ID.
        alert_id: String,
        /// Alert type ("high_failure_rate", "channel_died", ...).
        alert_type: String,
        /// Severity string ("info", "warning", "error", "critical").
        severity: String,
        /// Short title.
        title: String,
    },
}

impl AlertEvent {
    fn description(&self) -> &str {
        match self {
            AlertEvent::Raised { .. } => "Alert raised",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally: multiple producers (clone the
/// `EventBus`), multiple independent consumers, non-blocking sends, and
/// lagging detection for slow subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver. Past events are not
    /// replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_event() -> CoreEvent {
        CoreEvent::Sync(SyncEvent::Started {
            sync_id: "sync-1".to_string(),
            user_id: "user-1".to_string(),
            kind: "subscriptions".to_string(),
        })
    }

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit(started_event()).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, started_event());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(started_event()).unwrap();

        assert_eq!(rx1.recv().await.unwrap(), started_event());
        assert_eq!(rx2.recv().await.unwrap(), started_event());
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(started_event()).is_err());
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Sync(SyncEvent::Failed {
            sync_id: "s".to_string(),
            message: "boom".to_string(),
            channels_processed: 0,
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(started_event().severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = started_event();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"Started\""));
    }
}
