use crate::filter::scoring::{ContentType, QualityAnalysis};
use std::collections::HashSet;

/// Most tags attached to a single post
pub const MAX_TAGS: usize = 10;

/// Marketing and stock-photo terms never used as tags
const TAG_BLACKLIST: &[&str] = &[
    "stock",
    "stock photo",
    "royalty free",
    "royalty-free",
    "free",
    "download",
    "hd",
    "4k",
    "wallpaper",
    "shutterstock",
    "getty",
    "istock",
    "sale",
    "buy",
    "best",
    "premium",
];

/// Alt-text words too short or too common to be useful as tags
const STOP_WORDS: &[&str] = &[
    "the", "and", "with", "from", "for", "that", "this", "over", "into", "under", "near", "its",
    "are", "was", "has", "have", "a", "an", "of", "on", "in", "at", "by", "to", "or",
];

/// Builds the tag list for a post
///
/// Tags come from, in order: the analysis's suggested tags, its content type
/// (unless `other`), the source domain and the alt-text words. Every tag is
/// lower-cased and trimmed. Duplicates, blacklisted marketing terms and short
/// stop words are dropped, and at most [`MAX_TAGS`] are returned.
pub fn generate_tags(
    analysis: &QualityAnalysis,
    source_domain: &str,
    alt: Option<&str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();

    let domain_tag = source_domain
        .trim_start_matches("www.")
        .split('.')
        .next()
        .unwrap_or("")
        .to_string();

    let alt_words = alt
        .unwrap_or("")
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_string);

    let candidates = analysis
        .suggested_tags
        .iter()
        .cloned()
        .chain(
            (analysis.content_type != ContentType::Other)
                .then(|| analysis.content_type.as_str().to_string()),
        )
        .chain(std::iter::once(domain_tag))
        .chain(alt_words);

    for raw in candidates {
        let tag = raw.trim().to_lowercase();
        if tag.is_empty()
            || TAG_BLACKLIST.contains(&tag.as_str())
            || STOP_WORDS.contains(&tag.as_str())
        {
            continue;
        }
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
        if tags.len() == MAX_TAGS {
            break;
        }
    }

    tags
}
