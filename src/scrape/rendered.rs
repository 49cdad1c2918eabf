//! Breadth-first crawling through a rendered page session
//!
//! A single render session is shared by every call. It is created on first
//! use, health-checked before each reuse and recreated after a disconnect.
//! [`RenderSessionHandle::shutdown`] closes it exactly once; later renders fail.

use crate::filter::is_blacklisted;
use crate::scrape::{CandidateImage, ScrapeOptions, ScrapeOutput, Scraper};
use crate::url::{extract_domain, resolve_url, same_domain};
use crate::{GleanError, Result};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Rendered images smaller than this on either side are skipped
pub const MIN_RENDERED_DIMENSION: u32 = 150;

/// Low-resolution CDN path fragments and their high-resolution replacements
const CDN_UPGRADES: &[(&str, &str, &str)] = &[
    ("pinimg.com", "/236x/", "/736x/"),
    ("pinimg.com", "/474x/", "/736x/"),
    ("pinimg.com", "/564x/", "/736x/"),
    ("twimg.com", "name=small", "name=large"),
    ("twimg.com", "name=medium", "name=large"),
    ("twimg.com", "name=thumb", "name=large"),
];

/// An image element as laid out in the rendered page
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RenderedImage {
    /// `currentSrc` or `src`, possibly relative
    pub src: String,
    pub alt: Option<String>,

    /// Bounding-box size in CSS pixels
    pub width: f64,
    pub height: f64,

    /// `href` of the nearest enclosing `<a>`, if any
    pub link: Option<String>,
}

/// What one page looked like after rendering
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    /// URL after redirects
    pub final_url: String,
    pub images: Vec<RenderedImage>,
    pub links: Vec<String>,
}

/// A live render session
#[async_trait]
pub trait RenderSession: Send {
    /// Whether the session is still connected
    async fn is_alive(&mut self) -> bool;

    /// Loads a page, triggers lazy content and reports its images and links
    async fn render(&mut self, url: &Url) -> Result<RenderedPage>;

    async fn close(&mut self) -> Result<()>;
}

/// Creates render sessions
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Whether sessions can be created at all in this build
    fn is_available(&self) -> bool {
        true
    }

    async fn create(&self) -> Result<Box<dyn RenderSession>>;
}

/// Factory used when no renderer is compiled in
pub struct UnavailableSessionFactory;

#[async_trait]
impl SessionFactory for UnavailableSessionFactory {
    fn is_available(&self) -> bool {
        false
    }

    async fn create(&self) -> Result<Box<dyn RenderSession>> {
        Err(GleanError::NotConfigured {
            capability: "renderer",
            reason: "built without the `browser` feature".to_string(),
        })
    }
}

/// The one shared render session
pub struct RenderSessionHandle {
    factory: Arc<dyn SessionFactory>,
    session: Mutex<Option<Box<dyn RenderSession>>>,
    closed: AtomicBool,
}

impl RenderSessionHandle {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            session: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Renders a page, creating or replacing the session as needed
    ///
    /// The navigation is bounded by `timeout`. After a failed render the
    /// session is health-checked and dropped if it disconnected, so the next
    /// call starts a fresh one.
    pub async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage> {
        let mut guard = self.session.lock().await;

        if self.closed.load(Ordering::SeqCst) {
            return Err(GleanError::Render("render session is shut down".to_string()));
        }

        let reusable = match guard.as_mut() {
            Some(session) => session.is_alive().await,
            None => false,
        };

        if !reusable {
            if let Some(mut stale) = guard.take() {
                tracing::info!("Render session disconnected, recreating");
                if let Err(e) = stale.close().await {
                    tracing::debug!("Closing stale render session failed: {}", e);
                }
            }
            *guard = Some(self.factory.create().await?);
            tracing::debug!("Render session created");
        }

        let Some(session) = guard.as_mut() else {
            return Err(GleanError::Render("render session unavailable".to_string()));
        };

        let result = match tokio::time::timeout(timeout, session.render(url)).await {
            Ok(result) => result,
            Err(_) => Err(GleanError::Timeout {
                url: url.to_string(),
            }),
        };

        if result.is_err() && !session.is_alive().await {
            *guard = None;
        }

        result
    }

    /// Closes the session; only the first call has any effect
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut guard = self.session.lock().await;
        if let Some(mut session) = guard.take() {
            match session.close().await {
                Ok(()) => tracing::info!("Render session closed"),
                Err(e) => tracing::warn!("Failed to close render session: {}", e),
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// A renderer is compiled in and the handle has not been shut down
    pub fn is_available(&self) -> bool {
        self.factory.is_available() && !self.is_shut_down()
    }
}

/// Rewrites known low-resolution CDN URLs to a larger variant
///
/// ```
/// use gleaner::scrape::upgrade_cdn_url;
///
/// assert_eq!(
///     upgrade_cdn_url("https://i.pinimg.com/236x/ab/cd/ef.jpg"),
///     "https://i.pinimg.com/736x/ab/cd/ef.jpg"
/// );
/// ```
pub fn upgrade_cdn_url(url: &str) -> String {
    CDN_UPGRADES
        .iter()
        .find(|(host, from, _)| url.contains(host) && url.contains(from))
        .map(|(_, from, to)| url.replacen(from, to, 1))
        .unwrap_or_else(|| url.to_string())
}

/// Crawls breadth-first from a seed URL through the shared render session
pub struct RenderedScraper {
    handle: Arc<RenderSessionHandle>,
    navigation_timeout: Duration,
}

impl RenderedScraper {
    pub fn new(handle: Arc<RenderSessionHandle>, navigation_timeout: Duration) -> Self {
        Self {
            handle,
            navigation_timeout,
        }
    }

    /// Turns rendered image elements into candidates
    fn collect_images(
        &self,
        page: &RenderedPage,
        page_url: &Url,
        seen: &mut HashSet<String>,
        images: &mut Vec<CandidateImage>,
        limit: usize,
    ) {
        let source_domain = extract_domain(page_url).unwrap_or_default();

        for element in &page.images {
            if images.len() >= limit {
                break;
            }

            let width = element.width.max(0.0).round() as u32;
            let height = element.height.max(0.0).round() as u32;
            if width < MIN_RENDERED_DIMENSION || height < MIN_RENDERED_DIMENSION {
                continue;
            }

            let Some(resolved) = resolve_url(&element.src, page_url) else {
                continue;
            };
            let url = upgrade_cdn_url(resolved.as_str());
            if is_blacklisted(&url) || !seen.insert(url.clone()) {
                continue;
            }

            // The on-screen size belongs to the thumbnail, not the upgraded file
            let (width, height) = if url != resolved.as_str() {
                (None, None)
            } else {
                (Some(width), Some(height))
            };

            let link_page = element
                .link
                .as_deref()
                .and_then(|href| resolve_url(href, page_url))
                .map(|u| u.to_string());

            images.push(CandidateImage {
                url,
                page_url: link_page.unwrap_or_else(|| page_url.to_string()),
                source_domain: source_domain.clone(),
                alt: element
                    .alt
                    .as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string),
                width,
                height,
            });
        }
    }
}

#[async_trait]
impl Scraper for RenderedScraper {
    fn name(&self) -> &str {
        "rendered"
    }

    fn is_configured(&self) -> bool {
        self.handle.is_available()
    }

    /// Visits pages breadth-first up to `options.max_depth` levels below the seed
    ///
    /// A failure on the seed page fails the call. Failures on deeper pages are
    /// logged and skipped. Returned links are every outbound link seen on a
    /// visited page, filtered to the seed's domain unless `follow_links` is set.
    async fn scrape(
        &self,
        seed: &str,
        limit: usize,
        options: &ScrapeOptions,
    ) -> Result<ScrapeOutput> {
        let seed_url = Url::parse(seed)?;

        let mut queue: VecDeque<(Url, u32)> = VecDeque::from([(seed_url.clone(), 0)]);
        let mut visited: HashSet<String> = HashSet::new();
        let mut seen_images = HashSet::new();
        let mut seen_links = HashSet::new();
        let mut images = Vec::new();
        let mut links = Vec::new();

        while let Some((url, depth)) = queue.pop_front() {
            if images.len() >= limit {
                break;
            }
            if !visited.insert(url.to_string()) {
                continue;
            }

            let page = match self.handle.render(&url, self.navigation_timeout).await {
                Ok(page) => page,
                Err(e) if depth == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!("Skipping {} at depth {}: {}", url, depth, e);
                    continue;
                }
            };

            let page_url = Url::parse(&page.final_url).unwrap_or_else(|_| url.clone());
            visited.insert(page_url.to_string());

            self.collect_images(&page, &page_url, &mut seen_images, &mut images, limit);

            for href in &page.links {
                let Some(link) = resolve_url(href, &page_url) else {
                    continue;
                };
                if !options.follow_links && !same_domain(&link, &seed_url) {
                    continue;
                }
                if seen_links.insert(link.to_string()) {
                    links.push(link.to_string());
                    if depth < options.max_depth && !visited.contains(link.as_str()) {
                        queue.push_back((link, depth + 1));
                    }
                }
            }

            tracing::debug!(
                "Rendered {} (depth {}): {} candidates so far, {} queued",
                page_url,
                depth,
                images.len(),
                queue.len()
            );
        }

        Ok(ScrapeOutput { images, links })
    }

    async fn shutdown(&self) {
        self.handle.shutdown().await;
    }
}
