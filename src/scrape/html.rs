//! Image and link extraction from static HTML
//!
//! This module parses a fetched page to extract:
//! - The page's preview image (`og:image`, `twitter:image`)
//! - Embedded `<img>` elements, including lazy-loading attributes and `srcset`
//! - Outbound links (from `<a>` tags)

use crate::filter::is_blacklisted;
use crate::scrape::CandidateImage;
use crate::url::{extract_domain, resolve_url};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Images declaring a side smaller than this are skipped
pub const MIN_DECLARED_DIMENSION: u32 = 100;

const PREVIEW_META: &[&str] = &[
    "meta[property='og:image']",
    "meta[property='og:image:url']",
    "meta[name='twitter:image']",
    "meta[name='twitter:image:src']",
];

const LAZY_SRC_ATTRS: &[&str] = &["data-src", "data-lazy-src", "data-original"];

/// Images and links extracted from one page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub images: Vec<CandidateImage>,
    pub links: Vec<String>,
}

/// Extracts candidate images and links from an HTML document
///
/// # Extraction Rules
///
/// - The first preview meta tag found becomes the first candidate
/// - `<img>` elements use `src`, falling back to lazy-loading attributes;
///   a `srcset` entry wider than anything else replaces the plain source
/// - Relative URLs resolve against `<base href>` when present, else the page URL
/// - Images declaring a width or height under 100px are skipped
/// - Blacklisted (decorative/tracking) URLs are skipped
/// - Each image URL appears at most once
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `page_url` - The URL the document was fetched from
///
/// # Example
///
/// ```
/// use gleaner::scrape::extract_page_images;
/// use url::Url;
///
/// let html = r#"<html><body><img src="/photos/lake.jpg" alt="Lake"></body></html>"#;
/// let page = Url::parse("https://example.com/gallery").unwrap();
/// let parsed = extract_page_images(html, &page);
/// assert_eq!(parsed.images[0].url, "https://example.com/photos/lake.jpg");
/// ```
pub fn extract_page_images(html: &str, page_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let base_url = document_base(&document, page_url);
    let source_domain = extract_domain(page_url).unwrap_or_default();

    let mut seen = HashSet::new();
    let mut images = Vec::new();

    let mut push = |url: Url, alt: Option<String>, width: Option<u32>, height: Option<u32>| {
        let url = url.to_string();
        if is_blacklisted(&url) || !seen.insert(url.clone()) {
            return;
        }
        images.push(CandidateImage {
            url,
            page_url: page_url.to_string(),
            source_domain: source_domain.clone(),
            alt,
            width,
            height,
        });
    };

    if let Some(preview) = preview_image(&document, &base_url) {
        push(preview, None, None, None);
    }

    if let Ok(img_selector) = Selector::parse("img") {
        for element in document.select(&img_selector) {
            let width = declared_dimension(element, "width");
            let height = declared_dimension(element, "height");
            if width.map_or(false, |w| w < MIN_DECLARED_DIMENSION)
                || height.map_or(false, |h| h < MIN_DECLARED_DIMENSION)
            {
                continue;
            }

            let Some(src) = image_source(element, &base_url) else {
                continue;
            };

            let alt = element
                .value()
                .attr("alt")
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty());

            push(src, alt, width, height);
        }
    }

    ParsedPage {
        images,
        links: extract_links(&document, &base_url),
    }
}

/// Resolves `<base href>` against the page URL
fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|e| e.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

fn preview_image(document: &Html, base_url: &Url) -> Option<Url> {
    PREVIEW_META.iter().find_map(|selector| {
        let selector = Selector::parse(selector).ok()?;
        document
            .select(&selector)
            .filter_map(|e| e.value().attr("content"))
            .find_map(|content| resolve_url(content, base_url))
    })
}

/// Picks the best source URL for an `<img>` element
fn image_source(element: ElementRef<'_>, base_url: &Url) -> Option<Url> {
    let attrs = element.value();

    let plain = std::iter::once("src")
        .chain(LAZY_SRC_ATTRS.iter().copied())
        .filter_map(|name| attrs.attr(name))
        .find_map(|value| resolve_url(value, base_url));

    let widest = attrs
        .attr("srcset")
        .or_else(|| attrs.attr("data-srcset"))
        .and_then(widest_srcset_entry)
        .and_then(|value| resolve_url(&value, base_url));

    widest.or(plain)
}

/// Returns the URL of the widest `srcset` candidate
///
/// Width descriptors (`800w`) are compared directly; density descriptors
/// (`2x`) rank below any width descriptor. An entry without a descriptor
/// counts as `1x`.
fn widest_srcset_entry(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?;
            let rank = match parts.next() {
                Some(d) if d.ends_with('w') => {
                    d.trim_end_matches('w').parse::<f64>().ok()? * 1000.0
                }
                Some(d) if d.ends_with('x') => d.trim_end_matches('x').parse::<f64>().ok()?,
                Some(_) => return None,
                None => 1.0,
            };
            Some((url.to_string(), rank))
        })
        .fold(None, |best: Option<(String, f64)>, (url, rank)| match best {
            Some((_, best_rank)) if best_rank >= rank => best,
            _ => Some((url, rank)),
        })
        .map(|(url, _)| url)
}

/// Parses a `width`/`height` attribute such as `640` or `640px`
fn declared_dimension(element: ElementRef<'_>, name: &str) -> Option<u32> {
    let value = element.value().attr(name)?.trim();
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || value[digits.len()..].starts_with('%') {
        return None;
    }
    digits.parse().ok()
}

/// Extracts all followable links from the document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_url(href, base_url) {
                    let link = absolute_url.to_string();
                    if seen.insert(link.clone()) {
                        links.push(link);
                    }
                }
            }
        }
    }

    links
}
