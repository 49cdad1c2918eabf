//! First filter stage: cheap, pure rejection rules

use crate::filter::blacklist::is_blacklisted;
use crate::scrape::CandidateImage;
use std::fmt;

/// Smallest side, in pixels, a candidate may have when its size is known
pub const MIN_DIMENSION: u32 = 400;

/// Widest accepted width/height ratio
pub const MAX_ASPECT_RATIO: f64 = 4.0;

/// Narrowest accepted width/height ratio
pub const MIN_ASPECT_RATIO: f64 = 0.25;

/// Why the rule stage rejected a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleRejection {
    TooSmall,
    BadAspectRatio,
    Decorative,
}

impl RuleRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooSmall => "too small",
            Self::BadAspectRatio => "bad aspect ratio",
            Self::Decorative => "decorative",
        }
    }
}

impl fmt::Display for RuleRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies the rule stage to a candidate
///
/// Unknown dimensions never cause a rejection on their own, but any known
/// dimension under [`MIN_DIMENSION`] does. The aspect ratio is only checked
/// when both dimensions are known.
///
/// # Returns
///
/// * `None` - The candidate may continue to scoring
/// * `Some(RuleRejection)` - The first rule the candidate failed
pub fn check_rules(candidate: &CandidateImage) -> Option<RuleRejection> {
    let too_small = [candidate.width, candidate.height]
        .iter()
        .flatten()
        .any(|&side| side < MIN_DIMENSION);
    if too_small {
        return Some(RuleRejection::TooSmall);
    }

    if let Some(ratio) = candidate.aspect_ratio() {
        if !(MIN_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&ratio) {
            return Some(RuleRejection::BadAspectRatio);
        }
    }

    if is_blacklisted(&candidate.url) {
        return Some(RuleRejection::Decorative);
    }

    None
}
