/// URL keywords marking decorative, tracking or placeholder images
pub const DECORATIVE_KEYWORDS: &[&str] = &[
    "logo",
    "icon",
    "avatar",
    "sprite",
    "tracking",
    "pixel",
    "spacer",
    "beacon",
    "placeholder",
    "spinner",
    "favicon",
    "emoji",
    "badge",
    "loading",
    "1x1",
    "blank.gif",
    "transparent.gif",
    "advert",
];

/// Returns the first decorative keyword contained in the URL, if any
///
/// Matching is a case-insensitive substring test over the whole URL, so
/// keywords hit in path segments, file names and query strings alike.
pub fn matched_keyword(url: &str) -> Option<&'static str> {
    let lower = url.to_lowercase();
    DECORATIVE_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| lower.contains(keyword))
}

/// Returns true if the URL looks like a decorative or tracking image
pub fn is_blacklisted(url: &str) -> bool {
    matched_keyword(url).is_some()
}
