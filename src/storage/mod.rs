//! Storage module for the frontier, the ledger and run bookkeeping
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Source rows synced from configuration
//! - The crawl frontier queue
//! - The dedup and failure ledger
//! - Daily counters, job runs and quality rejections

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{QueueStatus, SourceKind};
use crate::GleanError;

use chrono::NaiveDate;
use std::path::Path;

/// Failures after which an image URL is skipped for good
pub const FAILURE_THRESHOLD: u32 = 3;

/// Fail count written by the force-skip operator action
pub const PERMANENT_SKIP_COUNT: u32 = 999;

/// Date format used for `daily_stats` keys
pub const STATS_DATE_FORMAT: &str = "%Y-%m-%d";

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(GleanError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, GleanError> {
    SqliteStorage::new(path)
}

/// A configured source as stored in the database
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub id: i64,
    pub name: String,
    pub kind: SourceKind,
    pub query: String,
    pub enabled: bool,
    pub last_scraped_at: Option<String>,
    pub total_scraped: u64,
    pub crawl_depth: Option<u32>,
    pub follow_links: bool,
}

impl SourceRecord {
    /// Page-url sources with a depth limit are visited through the frontier
    pub fn is_crawlable(&self) -> bool {
        self.kind == SourceKind::Url && self.crawl_depth.is_some()
    }

    /// Sources handled by the batch pass
    pub fn is_batch_eligible(&self) -> bool {
        !self.is_crawlable()
    }
}

/// A page visit in the crawl frontier
#[derive(Debug, Clone)]
pub struct FrontierItem {
    pub id: i64,
    pub url: String,
    pub source_id: i64,
    pub depth: u32,
    pub priority: i64,
    pub status: QueueStatus,
    pub discovered_at: String,
    pub last_attempt_at: Option<String>,
    pub last_error: Option<String>,
}

/// A page visit about to be enqueued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFrontierItem {
    pub url: String,
    pub source_id: i64,
    pub depth: u32,
    pub priority: i64,
}

/// Per-URL failure bookkeeping
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub url: String,
    pub fail_count: u32,
    pub last_reason: Option<String>,
    pub first_failed_at: String,
    pub last_failed_at: String,
}

impl FailureRecord {
    pub fn is_permanent(&self) -> bool {
        self.fail_count >= FAILURE_THRESHOLD
    }
}

/// A candidate the quality filter turned away
#[derive(Debug, Clone)]
pub struct RejectionRecord {
    pub source_id: Option<i64>,
    pub url: String,
    pub score: u8,
    pub content_type: String,
    pub reason: String,
}

/// Counters accumulated by one orchestrator pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub scraped: u64,
    pub uploaded: u64,
    pub failed: u64,
    pub filtered: u64,
}

/// A recorded orchestrator pass
#[derive(Debug, Clone)]
pub struct JobRunRecord {
    pub id: i64,
    pub mode: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub config_hash: String,
    pub counters: RunCounters,
    pub error: Option<String>,
}

/// One row of `daily_stats`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyStats {
    pub date: String,
    pub images_scraped: u64,
    pub images_uploaded: u64,
    pub images_failed: u64,
    pub quality_filtered: u64,
}

/// Status of a job run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Daily counter that `increment_stat` bumps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Scraped,
    Uploaded,
    Failed,
    QualityFiltered,
}

impl StatKind {
    /// Column in `daily_stats` holding this counter
    pub fn column(&self) -> &'static str {
        match self {
            Self::Scraped => "images_scraped",
            Self::Uploaded => "images_uploaded",
            Self::Failed => "images_failed",
            Self::QualityFiltered => "quality_filtered",
        }
    }
}

/// Formats a date as a `daily_stats` key
pub fn stats_key(date: NaiveDate) -> String {
    date.format(STATS_DATE_FORMAT).to_string()
}
