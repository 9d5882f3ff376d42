//! Persistence layer over embedded SQLite.

pub mod migrations;
pub mod sqlite;

pub use migrations::run_migrations;
pub use sqlite::{
    AlternateUrl, JobFilter, JobStore, RetryQueueItem, SourceBreakdown, WeeklySummary,
};
