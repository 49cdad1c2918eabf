//! Statistics view over the harvest database
//!
//! This module provides functionality for extracting and displaying
//! today's counters, frontier progress, ledger totals and recent job runs.

use crate::state::QueueStatus;
use crate::storage::{DailyStats, JobRunRecord, Storage};
use crate::GleanError;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Job runs shown in the stats view
pub const RECENT_RUNS: usize = 5;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Counters for the requested day
    pub today: DailyStats,

    /// Frontier rows per status
    pub frontier: HashMap<QueueStatus, u64>,

    /// Image URLs in the dedup ledger
    pub ingested: u64,

    /// Image URLs at or past the failure threshold
    pub permanent_failures: u64,

    /// Quality filter rejections on record
    pub rejections: u64,

    /// Most recent job runs, newest first
    pub recent_runs: Vec<JobRunRecord>,
}

impl HarvestStatistics {
    /// Total rows in the frontier
    pub fn frontier_total(&self) -> u64 {
        self.frontier.values().sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `date` - Day whose counters are reported
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(GleanError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn Storage,
    date: NaiveDate,
) -> Result<HarvestStatistics, GleanError> {
    Ok(HarvestStatistics {
        today: storage.daily_stats(date)?,
        frontier: storage.frontier_counts()?,
        ingested: storage.count_ingested()?,
        permanent_failures: storage.count_permanent_failures()?,
        rejections: storage.count_rejections()?,
        recent_runs: storage.recent_job_runs(RECENT_RUNS)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Today ({}):", stats.today.date);
    println!("  Images scraped: {}", stats.today.images_scraped);
    println!("  Images uploaded: {}", stats.today.images_uploaded);
    println!("  Images failed: {}", stats.today.images_failed);
    println!("  Quality filtered: {}", stats.today.quality_filtered);
    println!();

    println!("Ledger:");
    println!("  Ingested images: {}", stats.ingested);
    println!("  Permanently failed: {}", stats.permanent_failures);
    println!("  Quality rejections: {}", stats.rejections);
    println!();

    let total = stats.frontier_total();
    println!("Frontier ({} items):", total);
    for status in QueueStatus::all_states() {
        let count = stats.frontier.get(&status).copied().unwrap_or(0);
        let percentage = if total > 0 {
            (count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if stats.recent_runs.is_empty() {
        println!("No job runs recorded");
        return;
    }

    println!("Recent Runs:");
    for run in &stats.recent_runs {
        println!(
            "  #{} {} [{}] started {}: {} scraped, {} uploaded, {} filtered, {} failed",
            run.id,
            run.mode,
            run.status.to_db_string(),
            run.started_at,
            run.counters.scraped,
            run.counters.uploaded,
            run.counters.filtered,
            run.counters.failed
        );
        if let Some(error) = &run.error {
            println!("      error: {}", error);
        }
    }
}
