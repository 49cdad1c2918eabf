//! Continuous frontier mode
//!
//! Crawlable sources seed the frontier with their page URL at depth 0. Each
//! pass dequeues a fixed batch and visits the items one at a time through the
//! rendered strategy, feeding the candidates through the shared pipeline and
//! enqueueing discovered links one level deeper while the source's depth
//! limit allows.

use super::{Orchestrator, PassMode, PassReport};
use crate::scrape::ScrapeOptions;
use crate::state::QueueStatus;
use crate::storage::{FrontierItem, NewFrontierItem, RunCounters, SourceRecord, Storage};
use crate::url::normalize_url;
use crate::{GleanError, Result};
use std::collections::HashMap;

/// Priority of a seed URL; each level below it loses 10
pub const SEED_PRIORITY: i64 = 100;

const DEPTH_PENALTY: i64 = 10;

/// Frontier priority for a page `depth` levels below its seed
pub fn priority_for_depth(depth: u32) -> i64 {
    SEED_PRIORITY - DEPTH_PENALTY * depth as i64
}

impl Orchestrator {
    /// Enqueues the seed URL of every enabled crawlable source
    ///
    /// Safe to repeat: seeds already in the frontier are left alone.
    ///
    /// # Returns
    ///
    /// The number of seeds actually inserted
    pub fn seed_frontier(&self) -> Result<usize> {
        let sources = self.with_storage(|storage| storage.enabled_sources())?;

        let seeds: Vec<NewFrontierItem> = sources
            .iter()
            .filter(|s| s.is_crawlable())
            .filter_map(|source| match normalize_url(&source.query) {
                Ok(url) => Some(NewFrontierItem {
                    url: url.to_string(),
                    source_id: source.id,
                    depth: 0,
                    priority: SEED_PRIORITY,
                }),
                Err(e) => {
                    tracing::warn!("Source {} has an invalid seed URL: {}", source.name, e);
                    None
                }
            })
            .collect();

        if seeds.is_empty() {
            return Ok(0);
        }

        let inserted = self.with_storage(|storage| storage.enqueue(&seeds))?;
        tracing::info!("Seeded {} of {} crawl seeds", inserted, seeds.len());
        Ok(inserted)
    }

    /// Runs one frontier pass
    ///
    /// Seeds the frontier, then dequeues up to `frontier-batch-size` pending
    /// items and visits each in priority order.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(report))` - The pass ran
    /// * `Ok(None)` - Another pass was running; nothing was done
    /// * `Err(GleanError)` - Job bookkeeping or the frontier itself failed
    pub async fn run_frontier(&self) -> Result<Option<PassReport>> {
        let Some(_permit) = self.guard.try_acquire() else {
            tracing::info!("A pass is already running, skipping crawl trigger");
            return Ok(None);
        };

        let run_id = self.start_job_run(PassMode::Crawl)?;
        let mut counters = RunCounters::default();

        let outcome = self.frontier_pass(&mut counters).await;
        self.finish_job_run(run_id, &counters, &outcome)?;
        let visited = outcome?;

        tracing::info!(
            "Crawl pass complete: {} items, {} scraped, {} uploaded, {} filtered, {} failed",
            visited,
            counters.scraped,
            counters.uploaded,
            counters.filtered,
            counters.failed
        );

        Ok(Some(PassReport {
            mode: PassMode::Crawl,
            job_run_id: run_id,
            counters,
            visited,
        }))
    }

    async fn frontier_pass(&self, counters: &mut RunCounters) -> Result<usize> {
        self.seed_frontier()?;

        if !self.scrapers.rendered().is_configured() {
            tracing::warn!("Renderer is not configured, frontier items stay pending");
            return Ok(0);
        }

        let limit = self.scheduler.frontier_batch_size as usize;
        let items = self.with_storage(|storage| storage.dequeue_batch(limit))?;
        if items.is_empty() {
            tracing::info!("Frontier is empty");
            return Ok(0);
        }

        let mut sources: HashMap<i64, SourceRecord> = HashMap::new();
        let mut visited = 0;

        for item in &items {
            if !sources.contains_key(&item.source_id) {
                let source = self.with_storage(|storage| storage.get_source(item.source_id))?;
                sources.insert(item.source_id, source);
            }
            let Some(source) = sources.get(&item.source_id) else {
                continue;
            };

            if !self.mark_in_flight(item.id) {
                tracing::debug!("Item {} already in flight, skipping", item.id);
                continue;
            }

            let result = self.visit_item(item, source, counters).await;

            let (status, error) = match &result {
                Ok(()) => (QueueStatus::Completed, None),
                Err(GleanError::NotConfigured { reason, .. }) => {
                    tracing::warn!(
                        "Renderer unavailable ({}), leaving {} and the rest of the batch pending",
                        reason,
                        item.url
                    );
                    self.clear_in_flight(item.id);
                    break;
                }
                Err(e) => {
                    tracing::error!("Frontier item {} ({}) failed: {}", item.id, item.url, e);
                    (QueueStatus::Failed, Some(e.to_string()))
                }
            };
            if let Err(e) = self.with_storage(|storage| {
                storage.mark_done(item.id, status, error.as_deref())
            }) {
                tracing::error!("Failed to update frontier item {}: {}", item.id, e);
            }

            self.clear_in_flight(item.id);
            visited += 1;
        }

        Ok(visited)
    }

    /// Renders one frontier page, ingests its candidates and enqueues its links
    async fn visit_item(
        &self,
        item: &FrontierItem,
        source: &SourceRecord,
        counters: &mut RunCounters,
    ) -> Result<()> {
        let scraper = self.scrapers.rendered();
        let options = ScrapeOptions {
            max_depth: 0,
            follow_links: source.follow_links,
        };
        let limit = self.scheduler.batch_size as usize;

        let output = scraper.scrape(&item.url, limit, &options).await?;

        let mut uploaded = 0u64;
        for candidate in &output.images {
            if self
                .process_candidate(source.id, candidate, counters)
                .await
                .is_uploaded()
            {
                uploaded += 1;
            }
        }

        let max_depth = source.crawl_depth.unwrap_or(0);
        let enqueued = if item.depth < max_depth {
            let next = child_items(&output.links, item);
            self.with_storage(|storage| storage.enqueue(&next))?
        } else {
            0
        };

        if uploaded > 0 {
            if let Err(e) =
                self.with_storage(|storage| storage.update_source_stats(source.id, uploaded))
            {
                tracing::warn!("Failed to update stats for source {}: {}", source.name, e);
            }
        }

        tracing::debug!(
            "Visited {} (depth {}): {} candidates, {} uploaded, {} links enqueued",
            item.url,
            item.depth,
            output.images.len(),
            uploaded,
            enqueued
        );
        Ok(())
    }
}

/// Frontier rows for links found on `parent`, one level deeper
fn child_items(links: &[String], parent: &FrontierItem) -> Vec<NewFrontierItem> {
    let depth = parent.depth + 1;
    links
        .iter()
        .filter_map(|link| normalize_url(link).ok())
        .map(|url| NewFrontierItem {
            url: url.to_string(),
            source_id: parent.source_id,
            depth,
            priority: priority_for_depth(depth),
        })
        .collect()
}
