//! Shared fixtures: fake scrapers, processors, sinks and render sessions

use async_trait::async_trait;
use gleaner::config::{SchedulerConfig, SourceEntry};
use gleaner::ingest::{ImageProcessor, PostSink, ProcessedAsset};
use gleaner::scrape::{
    CandidateImage, RenderSession, RenderedImage, RenderedPage, ScrapeOptions, ScrapeOutput,
    Scraper, SessionFactory,
};
use gleaner::{GleanError, Result, SourceKind};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

pub fn source(
    name: &str,
    kind: SourceKind,
    query: &str,
    crawl_depth: Option<u32>,
) -> SourceEntry {
    SourceEntry {
        name: name.to_string(),
        kind,
        query: query.to_string(),
        enabled: true,
        crawl_depth,
        follow_links: None,
    }
}

pub fn scheduler(batch_size: u32) -> SchedulerConfig {
    SchedulerConfig {
        batch_size,
        interval_minutes: 60,
        frontier_batch_size: 10,
    }
}

pub fn candidate(url: &str, width: u32, height: u32, alt: Option<&str>) -> CandidateImage {
    CandidateImage {
        url: url.to_string(),
        page_url: "https://photos.test/gallery".to_string(),
        source_domain: "photos.test".to_string(),
        alt: alt.map(str::to_string),
        width: Some(width),
        height: Some(height),
    }
}

/// Encodes a blank PNG of the given size
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    bytes
}

/// Returns `limit` distinct large candidates derived from the query
#[derive(Default)]
pub struct PoolScraper {
    pub limits: Mutex<Vec<usize>>,
}

#[async_trait]
impl Scraper for PoolScraper {
    fn name(&self) -> &str {
        "pool"
    }

    async fn scrape(
        &self,
        query: &str,
        limit: usize,
        _options: &ScrapeOptions,
    ) -> Result<ScrapeOutput> {
        self.limits.lock().unwrap().push(limit);
        let images = (0..limit)
            .map(|i| {
                candidate(
                    &format!("https://img.test/{}/{}.jpg", query, i),
                    2000,
                    1500,
                    Some("Rolling green hills in spring"),
                )
            })
            .collect();
        Ok(ScrapeOutput::images(images))
    }
}

/// Always returns the same candidates
pub struct FixedScraper {
    pub images: Vec<CandidateImage>,
}

#[async_trait]
impl Scraper for FixedScraper {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn scrape(
        &self,
        _query: &str,
        limit: usize,
        _options: &ScrapeOptions,
    ) -> Result<ScrapeOutput> {
        Ok(ScrapeOutput::images(
            self.images.iter().take(limit).cloned().collect(),
        ))
    }
}

/// Reports the candidate's own URL and dimensions as the stored asset
#[derive(Default)]
pub struct PassThroughProcessor {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageProcessor for PassThroughProcessor {
    async fn process(&self, candidate: &CandidateImage) -> Result<Option<ProcessedAsset>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(ProcessedAsset {
            url: candidate.url.clone(),
            width: candidate.width.unwrap_or(0),
            height: candidate.height.unwrap_or(0),
        }))
    }
}

/// Fails every download
#[derive(Default)]
pub struct FailingProcessor {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageProcessor for FailingProcessor {
    async fn process(&self, candidate: &CandidateImage) -> Result<Option<ProcessedAsset>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GleanError::HttpStatus {
            url: candidate.url.clone(),
            status: 404,
        })
    }
}

/// Records every post and hands out sequential ids
#[derive(Default)]
pub struct RecordingSink {
    pub posts: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }
}

#[async_trait]
impl PostSink for RecordingSink {
    async fn create_post(
        &self,
        asset: &ProcessedAsset,
        _source_url: &str,
        _source_domain: &str,
        tags: &[String],
        _description: Option<&str>,
    ) -> Result<String> {
        let mut posts = self.posts.lock().unwrap();
        posts.push((asset.url.clone(), tags.to_vec()));
        Ok(format!("post-{}", posts.len()))
    }
}

/// A site where every page shows one photo and links to two child pages
pub struct EndlessSiteSession;

#[async_trait]
impl RenderSession for EndlessSiteSession {
    async fn is_alive(&mut self) -> bool {
        true
    }

    async fn render(&mut self, url: &Url) -> Result<RenderedPage> {
        let path = url.path().trim_end_matches('/');
        let origin = url.origin().ascii_serialization();
        Ok(RenderedPage {
            final_url: url.to_string(),
            images: vec![RenderedImage {
                src: format!("https://cdn.gallery.test{}/photo.jpg", path),
                alt: Some("A quiet harbour at dawn".to_string()),
                width: 1600.0,
                height: 1200.0,
                link: None,
            }],
            links: (0..2)
                .map(|i| format!("{}{}/next-{}", origin, path, i))
                .collect(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct EndlessSiteFactory {
    pub created: AtomicUsize,
}

#[async_trait]
impl SessionFactory for EndlessSiteFactory {
    async fn create(&self) -> Result<Box<dyn RenderSession>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(EndlessSiteSession))
    }
}

/// Reports itself available but never manages to start a session
#[derive(Default)]
pub struct LaunchFailingFactory {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl SessionFactory for LaunchFailingFactory {
    async fn create(&self) -> Result<Box<dyn RenderSession>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(GleanError::NotConfigured {
            capability: "renderer",
            reason: "failed to launch browser: executable not found".to_string(),
        })
    }
}
