//! Orchestrator - ties scrapers, the quality filter, the ledger and the
//! ingestion collaborators together
//!
//! Two passes are offered:
//! - `batch`: query-API and static-page sources, a fixed image budget split
//!   across them
//! - `crawl`: crawlable page sources, drained one frontier item at a time
//!   through the rendered strategy
//!
//! Both passes share the per-candidate pipeline in `pipeline` and the
//! [`RunGuard`] that keeps two passes from overlapping.

mod batch;
mod crawl;
mod pipeline;
mod trigger;

pub use batch::per_source_target;
pub use crawl::{priority_for_depth, SEED_PRIORITY};
pub use pipeline::CandidateOutcome;
pub use trigger::{run_scheduled, PassMode, RunGuard, RunPermit};

use crate::config::{Config, SchedulerConfig, SourceEntry};
use crate::filter::QualityFilter;
use crate::ingest::{DownloadProcessor, HttpPostSink, ImageProcessor, PostSink};
use crate::scrape::{build_http_client, ScraperSet};
use crate::storage::{RunCounters, RunStatus, SqliteStorage, Storage, StorageResult};
use crate::{GleanError, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Summary of one finished pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub mode: PassMode,
    pub job_run_id: i64,
    pub counters: RunCounters,

    /// Sources scraped (batch) or frontier items processed (crawl)
    pub visited: usize,
}

/// Drives batch and crawl passes against one database
pub struct Orchestrator {
    storage: Arc<Mutex<SqliteStorage>>,
    scrapers: ScraperSet,
    filter: QualityFilter,
    processor: Arc<dyn ImageProcessor>,
    sink: Arc<dyn PostSink>,
    scheduler: SchedulerConfig,
    config_hash: String,
    guard: RunGuard,
    in_flight: Mutex<HashSet<i64>>,
}

impl Orchestrator {
    /// Creates an orchestrator from explicit collaborators
    ///
    /// The heuristic quality filter and default scheduler settings are used
    /// until replaced with [`with_filter`](Self::with_filter) and
    /// [`with_scheduler`](Self::with_scheduler).
    pub fn new(
        storage: SqliteStorage,
        scrapers: ScraperSet,
        processor: Arc<dyn ImageProcessor>,
        sink: Arc<dyn PostSink>,
    ) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            scrapers,
            filter: QualityFilter::new(),
            processor,
            sink,
            scheduler: SchedulerConfig::default(),
            config_hash: String::new(),
            guard: RunGuard::new(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_filter(mut self, filter: QualityFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Hash recorded on every job run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Builds the default stack from configuration
    ///
    /// Opens the database, syncs the `[[source]]` entries into it and wires
    /// the default scrapers, download processor and HTTP post sink to one
    /// shared client.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `config_hash` - Hash of the configuration file, stored on job runs
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to run passes
    /// * `Err(GleanError)` - The database or HTTP client could not be set up
    pub fn from_config(config: &Config, config_hash: &str) -> Result<Self> {
        let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;
        let client = build_http_client(&config.user_agent)?;

        let scrapers = ScraperSet::from_config(config, client.clone());
        let processor = DownloadProcessor::from_config(&config.storage, client.clone());
        let sink = HttpPostSink::from_config(&config.ingest, client);

        let orchestrator = Self::new(storage, scrapers, Arc::new(processor), Arc::new(sink))
            .with_scheduler(config.scheduler.clone())
            .with_config_hash(config_hash);

        let synced = orchestrator.sync_sources(&config.sources)?;
        tracing::info!("Synced {} sources from configuration", synced);

        Ok(orchestrator)
    }

    /// Upserts configured sources and disables any the file no longer names
    pub fn sync_sources(&self, entries: &[SourceEntry]) -> Result<usize> {
        self.with_storage(|storage| {
            for entry in entries {
                storage.upsert_source(entry)?;
            }
            let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
            let disabled = storage.disable_sources_except(&names)?;
            if disabled > 0 {
                tracing::info!("Disabled {} sources no longer in configuration", disabled);
            }
            Ok(entries.len())
        })
    }

    pub fn scheduler(&self) -> &SchedulerConfig {
        &self.scheduler
    }

    pub fn guard(&self) -> &RunGuard {
        &self.guard
    }

    /// Shared handle to the database, for read-only views such as stats
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        self.storage.clone()
    }

    /// Frontier items currently being worked on
    pub fn in_flight_items(&self) -> Vec<i64> {
        match self.in_flight.lock() {
            Ok(set) => set.iter().copied().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Releases the render session and any other scraper resources
    ///
    /// A pass cut short by the caller leaves its job run in the running
    /// state; those runs are recorded as interrupted here.
    pub async fn shutdown(&self) {
        match self.with_storage(|storage| storage.interrupt_running_job_runs()) {
            Ok(0) => {}
            Ok(n) => tracing::warn!("Marked {} unfinished job runs as interrupted", n),
            Err(e) => tracing::warn!("Failed to close unfinished job runs: {}", e),
        }
        self.scrapers.shutdown().await;
    }

    /// Runs a closure against the locked database
    ///
    /// The lock is never held across an await point.
    pub(crate) fn with_storage<T>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> Result<T> {
        let mut storage = self
            .storage
            .lock()
            .map_err(|_| GleanError::Storage("storage lock poisoned".to_string()))?;
        Ok(f(&mut *storage)?)
    }

    fn mark_in_flight(&self, item_id: i64) -> bool {
        self.in_flight
            .lock()
            .map(|mut set| set.insert(item_id))
            .unwrap_or(false)
    }

    fn clear_in_flight(&self, item_id: i64) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&item_id);
        }
    }

    /// Opens a job run row for a pass
    fn start_job_run(&self, mode: PassMode) -> Result<i64> {
        let hash = self.config_hash.clone();
        self.with_storage(|storage| storage.create_job_run(mode.as_str(), &hash))
    }

    /// Closes a job run row with the pass outcome
    fn finish_job_run(
        &self,
        run_id: i64,
        counters: &RunCounters,
        outcome: &Result<usize>,
    ) -> Result<()> {
        let (status, error) = match outcome {
            Ok(_) => (RunStatus::Completed, None),
            Err(e) => (RunStatus::Failed, Some(e.to_string())),
        };
        self.with_storage(|storage| {
            storage.finish_job_run(run_id, status, counters, error.as_deref())
        })
    }
}
