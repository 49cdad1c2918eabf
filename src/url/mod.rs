//! URL handling module
//!
//! This module provides page URL normalization for the crawl frontier, domain
//! extraction, and resolution of relative references found in markup.

mod domain;
mod normalize;

pub use domain::{extract_domain, same_domain};
pub use normalize::normalize_url;

use url::Url;

/// Resolves an `href`/`src` attribute against a base URL
///
/// Returns None if the reference should be ignored:
/// - empty or fragment-only references
/// - `javascript:`, `mailto:`, `tel:` and `data:` schemes
/// - anything that does not resolve to HTTP(S)
///
/// The fragment of the resolved URL is dropped.
pub fn resolve_url(reference: &str, base_url: &Url) -> Option<Url> {
    let reference = reference.trim();

    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    let lowered = reference.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let mut resolved = base_url.join(reference).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);

    Some(resolved)
}
