use super::{Orchestrator, PassMode, PassReport};
use crate::scrape::ScrapeOptions;
use crate::storage::{RunCounters, SourceRecord, Storage};
use crate::Result;

/// Upload target for each of `sources` sources sharing `batch_size` images
///
/// Rounds up, so every source gets a chance even when the budget is small.
pub fn per_source_target(batch_size: u32, sources: usize) -> usize {
    if sources == 0 {
        return 0;
    }
    (batch_size as usize).div_ceil(sources)
}

impl Orchestrator {
    /// Runs one batch pass over the enabled query-API and static-page sources
    ///
    /// Each source is asked for twice its target so the filter and ledger can
    /// discard candidates without starving it, and stops once the target is
    /// uploaded. `batch_size` overrides `[scheduler] batch-size`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(report))` - The pass ran
    /// * `Ok(None)` - Another pass was running; nothing was done
    /// * `Err(GleanError)` - Job bookkeeping or source loading failed
    pub async fn run_batch(&self, batch_size: Option<u32>) -> Result<Option<PassReport>> {
        let Some(_permit) = self.guard.try_acquire() else {
            tracing::info!("A pass is already running, skipping batch trigger");
            return Ok(None);
        };

        let batch_size = batch_size.unwrap_or(self.scheduler.batch_size);
        let run_id = self.start_job_run(PassMode::Batch)?;
        let mut counters = RunCounters::default();

        let outcome = self.batch_pass(batch_size, &mut counters).await;
        self.finish_job_run(run_id, &counters, &outcome)?;
        let visited = outcome?;

        tracing::info!(
            "Batch pass complete: {} sources, {} scraped, {} uploaded, {} filtered, {} failed",
            visited,
            counters.scraped,
            counters.uploaded,
            counters.filtered,
            counters.failed
        );

        Ok(Some(PassReport {
            mode: PassMode::Batch,
            job_run_id: run_id,
            counters,
            visited,
        }))
    }

    async fn batch_pass(&self, batch_size: u32, counters: &mut RunCounters) -> Result<usize> {
        let sources: Vec<SourceRecord> = self
            .with_storage(|storage| storage.enabled_sources())?
            .into_iter()
            .filter(SourceRecord::is_batch_eligible)
            .collect();

        if sources.is_empty() {
            tracing::info!("No enabled batch sources");
            return Ok(0);
        }

        let target = per_source_target(batch_size, sources.len());
        tracing::info!(
            "Batch of {} across {} sources ({} each)",
            batch_size,
            sources.len(),
            target
        );

        for source in &sources {
            let uploaded = self.scrape_source(source, target, counters).await;

            if let Err(e) =
                self.with_storage(|storage| storage.update_source_stats(source.id, uploaded))
            {
                tracing::warn!("Failed to update stats for source {}: {}", source.name, e);
            }
        }

        Ok(sources.len())
    }

    /// Scrapes one source and ingests candidates until `target` are uploaded
    ///
    /// Returns the number uploaded. Scrape errors are logged and count as zero.
    async fn scrape_source(
        &self,
        source: &SourceRecord,
        target: usize,
        counters: &mut RunCounters,
    ) -> u64 {
        let scraper = self.scrapers.for_source(source);
        if !scraper.is_configured() {
            tracing::warn!(
                "Source {} uses {} which is not configured, skipping",
                source.name,
                scraper.name()
            );
            return 0;
        }

        let output = match scraper
            .scrape(&source.query, target * 2, &ScrapeOptions::default())
            .await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Source {} ({}) failed: {}", source.name, scraper.name(), e);
                return 0;
            }
        };

        tracing::debug!(
            "Source {} returned {} candidates",
            source.name,
            output.images.len()
        );

        let mut uploaded = 0usize;
        for candidate in &output.images {
            if uploaded >= target {
                break;
            }
            if self
                .process_candidate(source.id, candidate, counters)
                .await
                .is_uploaded()
            {
                uploaded += 1;
            }
        }

        tracing::info!("Source {}: {}/{} uploaded", source.name, uploaded, target);
        uploaded as u64
    }
}
