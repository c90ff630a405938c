//! # Library Store Module
//!
//! SQLite persistence for the subscription mirror:
//! - Connection pooling with WAL mode and embedded migrations
//! - Domain models for channels, subscriptions, videos, history, and alerts
//! - Repository traits with SQLite implementations
//! - The shared daily quota counter with atomic ceiling enforcement
//!
//! ## Overview
//!
//! The sync engine treats this crate as its transactional collaborator: all
//! writes are conflict-key upserts that stay idempotent under re-runs, and
//! the quota counter is a single-statement increment-with-ceiling so that
//! concurrent consumers cannot overshoot the daily allowance.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{Result, StoreError};
