//! Second filter stage: quality scoring
//!
//! The heuristic scorer is always available. An [`ImageAnalyzer`] can be
//! plugged in to replace it; when the analyzer fails, the heuristic result is
//! used instead.

use crate::scrape::CandidateImage;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Score every candidate starts from
pub const BASE_SCORE: i32 = 5;

/// Lowest score a candidate may have and still pass
pub const PASS_SCORE: u8 = 5;

/// Both sides at or above this earn the large-image bonus
pub const LARGE_DIMENSION: u32 = 1920;

/// Either side at or above this earns the medium-image bonus
pub const MEDIUM_DIMENSION: u32 = 1200;

/// Widths below this lose a point
pub const NARROW_WIDTH: u32 = 600;

/// Alt text longer than this counts as descriptive
pub const DESCRIPTIVE_ALT_LEN: usize = 10;

const PLEASANT_RATIOS: &[f64] = &[1.0, 4.0 / 3.0, 3.0 / 2.0, 16.0 / 9.0];
const RATIO_TOLERANCE: f64 = 0.05;

/// Broad classification of an image's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Photo,
    Artwork,
    Screenshot,
    Graphic,
    Other,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Artwork => "artwork",
            Self::Screenshot => "screenshot",
            Self::Graphic => "graphic",
            Self::Other => "other",
        }
    }

    /// Guesses the content type from URL and alt text keywords
    pub fn classify(url: &str, alt: Option<&str>) -> Self {
        let haystack = format!("{} {}", url, alt.unwrap_or("")).to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| haystack.contains(w));

        if has(&["screenshot", "screen-shot", "screencap"]) {
            Self::Screenshot
        } else if has(&["illustration", "drawing", "painting", "artwork", "sketch"]) {
            Self::Artwork
        } else if has(&["diagram", "chart", "infographic", ".svg"]) {
            Self::Graphic
        } else if has(&[".jpg", ".jpeg", ".webp", "photo", "images.unsplash.com", "i.redd.it"])
        {
            Self::Photo
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the scoring stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAnalysis {
    /// Score in `1..=10`
    pub score: u8,
    pub content_type: ContentType,
    pub is_high_quality: bool,
    pub reason: String,
    pub suggested_tags: Vec<String>,
}

impl QualityAnalysis {
    /// True when the candidate should be ingested
    pub fn passes(&self) -> bool {
        self.score >= PASS_SCORE && self.is_high_quality
    }

    /// Forces the score into `1..=10`
    pub fn clamped(mut self) -> Self {
        self.score = self.score.clamp(1, 10);
        self
    }
}

/// External quality analysis backend
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &str;

    /// Analyzes a candidate that passed the rule stage
    async fn analyze(&self, candidate: &CandidateImage) -> Result<QualityAnalysis>;
}

/// Scores a candidate from its size, shape and alt text
///
/// # Scoring
///
/// Starting from 5:
/// - `+2` when both sides are at least 1920, else `+1` when either side is at least 1200
/// - `+1` for a ratio near 1:1, 4:3, 3:2 or 16:9 in either orientation
/// - `+1` for alt text longer than 10 characters
/// - `-1` for a width under 600
///
/// The result is clamped to `1..=10` and the candidate is high quality at 5 or more.
pub fn heuristic_score(candidate: &CandidateImage) -> QualityAnalysis {
    let mut score = BASE_SCORE;
    let mut notes = Vec::new();
    let mut tags = Vec::new();

    let width = candidate.width.unwrap_or(0);
    let height = candidate.height.unwrap_or(0);

    if width >= LARGE_DIMENSION && height >= LARGE_DIMENSION {
        score += 2;
        notes.push("large");
        tags.push("high-resolution".to_string());
    } else if width >= MEDIUM_DIMENSION || height >= MEDIUM_DIMENSION {
        score += 1;
        notes.push("medium-large");
    }

    if let Some(ratio) = candidate.aspect_ratio() {
        if is_pleasant_ratio(ratio) {
            score += 1;
            notes.push("pleasant ratio");
        }
        tags.push(orientation_tag(ratio).to_string());
    }

    if candidate
        .alt
        .as_deref()
        .map_or(false, |alt| alt.trim().chars().count() > DESCRIPTIVE_ALT_LEN)
    {
        score += 1;
        notes.push("descriptive alt");
    }

    if candidate.width.map_or(false, |w| w < NARROW_WIDTH) {
        score -= 1;
        notes.push("narrow");
    }

    let score = score.clamp(1, 10) as u8;
    let reason = if notes.is_empty() {
        format!("heuristic score {}", score)
    } else {
        format!("heuristic score {} ({})", score, notes.join(", "))
    };

    QualityAnalysis {
        score,
        content_type: ContentType::classify(&candidate.url, candidate.alt.as_deref()),
        is_high_quality: score >= PASS_SCORE,
        reason,
        suggested_tags: tags,
    }
}

fn is_pleasant_ratio(ratio: f64) -> bool {
    PLEASANT_RATIOS.iter().any(|&target| {
        (ratio - target).abs() <= RATIO_TOLERANCE || (ratio - 1.0 / target).abs() <= RATIO_TOLERANCE
    })
}

fn orientation_tag(ratio: f64) -> &'static str {
    if (ratio - 1.0).abs() <= RATIO_TOLERANCE {
        "square"
    } else if ratio > 1.0 {
        "landscape"
    } else {
        "portrait"
    }
}
