//! Per-candidate pipeline shared by both passes
//!
//! dedup → permanent-failure skip → quality filter → process → create post →
//! ledger write-back. Every failure is contained to the candidate.

use super::Orchestrator;
use crate::filter::{generate_tags, FilterDecision, QualityAnalysis};
use crate::scrape::CandidateImage;
use crate::storage::{RejectionRecord, RunCounters, StatKind, Storage, FAILURE_THRESHOLD};
use crate::Result;
use chrono::Utc;

/// What happened to one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// Posted and recorded in the ledger
    Uploaded { post_id: String },

    /// The ledger already holds this image URL
    AlreadyIngested,

    /// The image URL reached the failure threshold earlier
    PermanentlyFailed,

    /// The quality filter turned it away
    Filtered { reason: String },

    /// Processing, posting or bookkeeping failed
    Failed { reason: String },
}

impl CandidateOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, Self::Uploaded { .. })
    }
}

impl Orchestrator {
    /// Runs one candidate through the pipeline, updating `counters`
    ///
    /// Never returns an error: storage trouble is logged and reported as
    /// [`CandidateOutcome::Failed`].
    pub async fn process_candidate(
        &self,
        source_id: i64,
        candidate: &CandidateImage,
        counters: &mut RunCounters,
    ) -> CandidateOutcome {
        match self.try_candidate(source_id, candidate, counters).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Candidate {} failed: {}", candidate.url, e);
                counters.failed += 1;
                CandidateOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_candidate(
        &self,
        source_id: i64,
        candidate: &CandidateImage,
        counters: &mut RunCounters,
    ) -> Result<CandidateOutcome> {
        let url = candidate.url.as_str();

        let (ingested, permanent) = self.with_storage(|storage| {
            Ok((
                storage.is_already_ingested(url)?,
                storage.is_permanently_failed(url)?,
            ))
        })?;
        if ingested {
            tracing::debug!("Already ingested: {}", url);
            return Ok(CandidateOutcome::AlreadyIngested);
        }
        if permanent {
            tracing::debug!("Permanently failed, skipping: {}", url);
            return Ok(CandidateOutcome::PermanentlyFailed);
        }

        counters.scraped += 1;
        self.bump(StatKind::Scraped)?;

        let analysis = match self.filter.evaluate(candidate).await {
            FilterDecision::Accept(analysis) => analysis,
            decision => {
                let reason = decision
                    .reject_reason()
                    .unwrap_or_else(|| "rejected".to_string());
                let (score, content_type) = match &decision {
                    FilterDecision::RejectScore(a) => (a.score, a.content_type.as_str()),
                    _ => (0, "unknown"),
                };
                let rejection = RejectionRecord {
                    source_id: Some(source_id),
                    url: url.to_string(),
                    score,
                    content_type: content_type.to_string(),
                    reason: reason.clone(),
                };
                self.with_storage(|storage| storage.record_rejection(&rejection))?;
                self.bump(StatKind::QualityFiltered)?;
                counters.filtered += 1;

                tracing::debug!("Filtered {}: {}", url, reason);
                return Ok(CandidateOutcome::Filtered { reason });
            }
        };

        match self.ingest(candidate, &analysis).await {
            Ok(post_id) => {
                self.with_storage(|storage| storage.record_success(source_id, url, &post_id))?;
                self.bump(StatKind::Uploaded)?;
                counters.uploaded += 1;

                tracing::debug!("Uploaded {} as post {}", url, post_id);
                Ok(CandidateOutcome::Uploaded { post_id })
            }
            Err(reason) => {
                let count = self.with_storage(|storage| storage.record_failure(url, &reason))?;
                self.bump(StatKind::Failed)?;
                counters.failed += 1;

                if count >= FAILURE_THRESHOLD {
                    tracing::warn!(
                        "{} failed {} times and will be skipped: {}",
                        url,
                        count,
                        reason
                    );
                } else {
                    tracing::warn!("{} failed ({}/{}): {}", url, count, FAILURE_THRESHOLD, reason);
                }
                Ok(CandidateOutcome::Failed { reason })
            }
        }
    }

    /// Processes and posts an accepted candidate; errors come back as the
    /// reason recorded in the failure ledger
    async fn ingest(
        &self,
        candidate: &CandidateImage,
        analysis: &QualityAnalysis,
    ) -> std::result::Result<String, String> {
        let asset = match self.processor.process(candidate).await {
            Ok(Some(asset)) => asset,
            Ok(None) => return Err("image unusable after download".to_string()),
            Err(e) => return Err(e.to_string()),
        };

        let alt = candidate.alt.as_deref();
        let tags = generate_tags(analysis, &candidate.source_domain, alt);

        self.sink
            .create_post(
                &asset,
                &candidate.page_url,
                &candidate.source_domain,
                &tags,
                alt,
            )
            .await
            .map_err(|e| e.to_string())
    }

    fn bump(&self, kind: StatKind) -> Result<()> {
        let today = Utc::now().date_naive();
        self.with_storage(|storage| storage.increment_stat(kind, today, 1))
    }
}
