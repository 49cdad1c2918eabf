//! Output module for reporting harvest progress
//!
//! This module handles:
//! - Loading daily counters, frontier and ledger totals from storage
//! - Printing them for the `--stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics, RECENT_RUNS};
