//! Scraper implementations
//!
//! Every strategy implements [`Scraper`]: given a query or seed URL and an
//! image limit, produce candidate images and, where the strategy follows
//! links, the outbound links it saw.
//!
//! # Components
//!
//! - `http`: shared HTTP client and page fetch
//! - `html`: image and link extraction from static markup
//! - `unsplash`, `reddit`: query-API strategies
//! - `static_page`: single-page strategy
//! - `rendered`: breadth-first crawl through one reusable render session
//! - `browser`: Chrome-backed render sessions (`browser` feature)

#[cfg(feature = "browser")]
mod browser;
mod html;
mod http;
mod reddit;
mod rendered;
mod static_page;
mod unsplash;

#[cfg(feature = "browser")]
pub use browser::ChromeSessionFactory;
pub use html::{extract_page_images, ParsedPage, MIN_DECLARED_DIMENSION};
pub use http::{build_http_client, fetch_page, FetchedPage, FETCH_TIMEOUT};
pub(crate) use http::{check_status, classify_request_error};
pub use reddit::RedditScraper;
pub use rendered::{
    upgrade_cdn_url, RenderSession, RenderSessionHandle, RenderedImage, RenderedPage,
    RenderedScraper, SessionFactory, UnavailableSessionFactory, MIN_RENDERED_DIMENSION,
};
pub use static_page::StaticPageScraper;
pub use unsplash::UnsplashScraper;

use crate::config::Config;
use crate::state::SourceKind;
use crate::storage::SourceRecord;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// An image discovered by a scrape call, not yet validated or ingested
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateImage {
    /// Absolute image URL
    pub url: String,

    /// Page the image was found on (or links to)
    pub page_url: String,

    /// Domain credited as the image's source
    pub source_domain: String,

    pub alt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl CandidateImage {
    /// Width divided by height, when both are known and non-zero
    pub fn aspect_ratio(&self) -> Option<f64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(w as f64 / h as f64),
            _ => None,
        }
    }
}

/// Per-call scraping options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeOptions {
    /// BFS levels below the seed to visit (rendered strategy only)
    pub max_depth: u32,

    /// Follow links to other domains (rendered strategy only)
    pub follow_links: bool,
}

/// What a scrape call found
#[derive(Debug, Clone, Default)]
pub struct ScrapeOutput {
    pub images: Vec<CandidateImage>,

    /// Outbound page links, absolute and deduplicated
    pub links: Vec<String>,
}

impl ScrapeOutput {
    pub fn images(images: Vec<CandidateImage>) -> Self {
        Self {
            images,
            links: Vec::new(),
        }
    }
}

/// A scraping strategy
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &str;

    /// Whether the credentials this strategy needs are present
    fn is_configured(&self) -> bool {
        true
    }

    /// Produces up to `limit` candidates for a query or seed URL
    async fn scrape(&self, query: &str, limit: usize, options: &ScrapeOptions)
        -> Result<ScrapeOutput>;

    /// Releases held resources; later calls may fail
    async fn shutdown(&self) {}
}

/// The scraping strategies, built once at startup
#[derive(Clone)]
pub struct ScraperSet {
    unsplash: Arc<dyn Scraper>,
    reddit: Arc<dyn Scraper>,
    static_page: Arc<dyn Scraper>,
    rendered: Arc<dyn Scraper>,
}

impl ScraperSet {
    /// Assembles a set from explicit strategies
    pub fn new(
        unsplash: Arc<dyn Scraper>,
        reddit: Arc<dyn Scraper>,
        static_page: Arc<dyn Scraper>,
        rendered: Arc<dyn Scraper>,
    ) -> Self {
        Self {
            unsplash,
            reddit,
            static_page,
            rendered,
        }
    }

    /// Builds the default strategies from configuration
    ///
    /// Credentials are read from the environment variables the `[api]` section
    /// names. The rendered strategy launches Chrome when the `browser` feature
    /// is enabled; without it, rendered scrapes fail with a not-configured error.
    pub fn from_config(config: &Config, client: Client) -> Self {
        let api = &config.api;

        let unsplash = UnsplashScraper::new(
            client.clone(),
            &api.unsplash_base_url,
            std::env::var(&api.unsplash_key_env).ok(),
        );

        let reddit = RedditScraper::new(
            client.clone(),
            &api.reddit_base_url,
            &api.reddit_auth_url,
            std::env::var(&api.reddit_client_id_env).ok(),
            std::env::var(&api.reddit_client_secret_env).ok(),
        );

        let static_page = StaticPageScraper::new(client);

        #[cfg(feature = "browser")]
        let factory: Arc<dyn SessionFactory> =
            Arc::new(ChromeSessionFactory::new(config.renderer.clone()));
        #[cfg(not(feature = "browser"))]
        let factory: Arc<dyn SessionFactory> = Arc::new(UnavailableSessionFactory);

        let rendered = RenderedScraper::new(
            Arc::new(RenderSessionHandle::new(factory)),
            Duration::from_secs(config.renderer.navigation_timeout_secs),
        );

        Self::new(
            Arc::new(unsplash),
            Arc::new(reddit),
            Arc::new(static_page),
            Arc::new(rendered),
        )
    }

    /// Strategy for a source kind; `crawlable` selects the rendered strategy
    /// for page URLs
    pub fn for_kind(&self, kind: SourceKind, crawlable: bool) -> Arc<dyn Scraper> {
        match kind {
            SourceKind::Unsplash => self.unsplash.clone(),
            SourceKind::Reddit => self.reddit.clone(),
            SourceKind::Url if crawlable => self.rendered.clone(),
            SourceKind::Url => self.static_page.clone(),
        }
    }

    /// Strategy for a stored source
    pub fn for_source(&self, source: &SourceRecord) -> Arc<dyn Scraper> {
        self.for_kind(source.kind, source.is_crawlable())
    }

    /// The rendered strategy used for frontier items
    pub fn rendered(&self) -> Arc<dyn Scraper> {
        self.rendered.clone()
    }

    /// Shuts every strategy down; safe to call more than once
    pub async fn shutdown(&self) {
        for scraper in [
            &self.unsplash,
            &self.reddit,
            &self.static_page,
            &self.rendered,
        ] {
            scraper.shutdown().await;
        }
        tracing::debug!("Scrapers shut down");
    }
}
