//! Quality filter for image candidates
//!
//! Two stages run in order and stop at the first rejection:
//! - `rules`: size, aspect ratio and decorative-keyword checks
//! - `scoring`: a 1-10 quality score, from an [`ImageAnalyzer`] when one is
//!   configured or from the built-in heuristic otherwise

mod blacklist;
mod rules;
mod scoring;
mod tags;

pub use blacklist::{is_blacklisted, matched_keyword, DECORATIVE_KEYWORDS};
pub use rules::{check_rules, RuleRejection, MIN_DIMENSION};
pub use scoring::{heuristic_score, ContentType, ImageAnalyzer, QualityAnalysis, PASS_SCORE};
pub use tags::{generate_tags, MAX_TAGS};

use crate::scrape::CandidateImage;
use std::sync::Arc;

/// Outcome of running a candidate through the filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterDecision {
    /// The candidate passed both stages
    Accept(QualityAnalysis),

    /// The candidate failed the rule stage
    RejectRule(RuleRejection),

    /// The candidate scored too low
    RejectScore(QualityAnalysis),
}

impl FilterDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept(_))
    }

    /// Human-readable rejection reason, or None when accepted
    pub fn reject_reason(&self) -> Option<String> {
        match self {
            Self::Accept(_) => None,
            Self::RejectRule(rule) => Some(rule.to_string()),
            Self::RejectScore(analysis) => Some(format!("low quality: {}", analysis.reason)),
        }
    }
}

/// The two-stage quality filter
#[derive(Clone, Default)]
pub struct QualityFilter {
    analyzer: Option<Arc<dyn ImageAnalyzer>>,
}

impl QualityFilter {
    /// Creates a filter that scores with the built-in heuristic
    pub fn new() -> Self {
        Self { analyzer: None }
    }

    /// Creates a filter that scores with an external analyzer
    pub fn with_analyzer(analyzer: Arc<dyn ImageAnalyzer>) -> Self {
        Self {
            analyzer: Some(analyzer),
        }
    }

    /// Runs both stages against a candidate
    pub async fn evaluate(&self, candidate: &CandidateImage) -> FilterDecision {
        if let Some(rejection) = check_rules(candidate) {
            return FilterDecision::RejectRule(rejection);
        }

        let analysis = self.score(candidate).await;
        if analysis.passes() {
            FilterDecision::Accept(analysis)
        } else {
            FilterDecision::RejectScore(analysis)
        }
    }

    async fn score(&self, candidate: &CandidateImage) -> QualityAnalysis {
        let Some(analyzer) = &self.analyzer else {
            return heuristic_score(candidate);
        };

        match analyzer.analyze(candidate).await {
            Ok(analysis) => analysis.clamped(),
            Err(e) => {
                tracing::warn!(
                    "Analyzer {} failed for {}, using heuristic: {}",
                    analyzer.name(),
                    candidate.url,
                    e
                );
                heuristic_score(candidate)
            }
        }
    }
}
