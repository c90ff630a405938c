//! Repository traits and their SQLite implementations.
//!
//! Each repository is an `async_trait` so the sync engine can substitute
//! test doubles; the `Sqlite*` implementations are thin wrappers over the
//! shared connection pool.

pub mod alert;
pub mod channel;
pub mod history;
pub mod quota;
pub mod subscription;
pub mod video;

pub use alert::{AlertRepository, NewAlert, SqliteAlertRepository};
pub use channel::{ChannelRepository, SqliteChannelRepository};
pub use history::{NewSyncHistoryEntry, SqliteSyncHistoryRepository, SyncHistoryRepository};
pub use quota::{QuotaRepository, SqliteQuotaRepository};
pub use subscription::{SqliteSubscriptionRepository, SubscriptionRepository};
pub use video::{ChannelVideoCounts, SqliteVideoRepository, VideoRepository};
