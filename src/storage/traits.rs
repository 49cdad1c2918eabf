//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::config::SourceEntry;
use crate::state::QueueStatus;
use crate::storage::{
    DailyStats, FailureRecord, FrontierItem, JobRunRecord, NewFrontierItem, RejectionRecord,
    RunCounters, RunStatus, SourceRecord, StatKind,
};
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Source not found: {0}")]
    SourceNotFound(i64),

    #[error("Queue item not found: {0}")]
    ItemNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid queue transition for item {id}: -> {to}")]
    InvalidTransition { id: i64, to: QueueStatus },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the orchestrator.
/// Every mutation is a single statement or a single transaction, so a crash
/// between calls leaves the database consistent.
pub trait Storage {
    // ===== Sources =====

    /// Inserts or updates a source from its configuration entry
    ///
    /// Sources are keyed by name. Counters and timestamps of an existing row
    /// are preserved.
    ///
    /// # Returns
    ///
    /// The source ID
    fn upsert_source(&mut self, entry: &SourceEntry) -> StorageResult<i64>;

    /// Disables every source whose name is not in `names`
    fn disable_sources_except(&mut self, names: &[&str]) -> StorageResult<usize>;

    /// Gets a source by ID
    fn get_source(&self, source_id: i64) -> StorageResult<SourceRecord>;

    /// Gets all enabled sources, ordered by ID
    fn enabled_sources(&self) -> StorageResult<Vec<SourceRecord>>;

    /// Adds to the cumulative scraped count and stamps the last-scraped time
    fn update_source_stats(&mut self, source_id: i64, scraped: u64) -> StorageResult<()>;

    // ===== Frontier =====

    /// Inserts pending items whose URL is not already queued
    ///
    /// # Returns
    ///
    /// The number of rows actually inserted
    fn enqueue(&mut self, items: &[NewFrontierItem]) -> StorageResult<usize>;

    /// Returns up to `limit` pending items without changing their status
    ///
    /// Ordered by priority descending, then discovery time ascending. Items
    /// whose source is disabled or no longer crawlable stay pending and are
    /// not returned.
    fn dequeue_batch(&self, limit: usize) -> StorageResult<Vec<FrontierItem>>;

    /// Moves an item to a terminal status and stamps the attempt time
    fn mark_done(
        &mut self,
        item_id: i64,
        status: QueueStatus,
        error: Option<&str>,
    ) -> StorageResult<()>;

    /// Returns true if the URL is already in the frontier, in any status
    fn is_queued(&self, url: &str) -> StorageResult<bool>;

    /// Counts frontier rows per status
    fn frontier_counts(&self) -> StorageResult<HashMap<QueueStatus, u64>>;

    /// Puts failed items back to pending
    ///
    /// # Returns
    ///
    /// The number of items reset
    fn reset_failed_items(&mut self) -> StorageResult<usize>;

    // ===== Ledger =====

    /// Returns true if the image URL was ingested before
    fn is_already_ingested(&self, image_url: &str) -> StorageResult<bool>;

    /// Returns true if the image URL reached the failure threshold
    fn is_permanently_failed(&self, image_url: &str) -> StorageResult<bool>;

    /// Records a successful ingestion; a repeated URL is ignored
    fn record_success(
        &mut self,
        source_id: i64,
        image_url: &str,
        post_id: &str,
    ) -> StorageResult<()>;

    /// Increments the failure count for an image URL
    ///
    /// # Returns
    ///
    /// The new failure count
    fn record_failure(&mut self, image_url: &str, reason: &str) -> StorageResult<u32>;

    /// Gets the failure record for an image URL
    fn get_failure(&self, image_url: &str) -> StorageResult<Option<FailureRecord>>;

    /// Clears the failure count for an image URL
    fn reset_failure(&mut self, image_url: &str) -> StorageResult<()>;

    /// Marks an image URL as permanently failed regardless of its count
    fn force_permanent_skip(&mut self, image_url: &str, reason: &str) -> StorageResult<()>;

    /// Records a candidate the quality filter rejected
    fn record_rejection(&mut self, rejection: &RejectionRecord) -> StorageResult<()>;

    // ===== Statistics =====

    /// Atomically adds `amount` to one daily counter
    fn increment_stat(&mut self, kind: StatKind, date: NaiveDate, amount: u64)
        -> StorageResult<()>;

    /// Gets the counters for one day, zeroed if none were recorded
    fn daily_stats(&self, date: NaiveDate) -> StorageResult<DailyStats>;

    /// Counts ingested images
    fn count_ingested(&self) -> StorageResult<u64>;

    /// Counts image URLs at or above the failure threshold
    fn count_permanent_failures(&self) -> StorageResult<u64>;

    /// Counts stored quality rejections
    fn count_rejections(&self) -> StorageResult<u64>;

    // ===== Job Runs =====

    /// Creates a new job run in the running state
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_job_run(&mut self, mode: &str, config_hash: &str) -> StorageResult<i64>;

    /// Finishes a job run with its counters and optional error text
    fn finish_job_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
        error: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets the most recent job runs, newest first
    fn recent_job_runs(&self, limit: usize) -> StorageResult<Vec<JobRunRecord>>;

    /// Marks every run still in the running state as interrupted
    ///
    /// # Returns
    ///
    /// The number of runs updated
    fn interrupt_running_job_runs(&mut self) -> StorageResult<usize>;
}
