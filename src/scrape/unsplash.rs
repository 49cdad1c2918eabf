//! Unsplash photo search

use crate::scrape::http::{check_status, classify_request_error};
use crate::scrape::{CandidateImage, ScrapeOptions, ScrapeOutput, Scraper};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Results per search page; the API maximum
const PER_PAGE: usize = 30;

const SOURCE_DOMAIN: &str = "unsplash.com";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct Photo {
    id: String,
    width: Option<u32>,
    height: Option<u32>,
    description: Option<String>,
    alt_description: Option<String>,
    urls: PhotoUrls,
    links: Option<PhotoLinks>,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    full: Option<String>,
    regular: Option<String>,
    raw: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotoLinks {
    html: Option<String>,
}

impl Photo {
    fn into_candidate(self) -> Option<CandidateImage> {
        let url = self.urls.full.or(self.urls.regular).or(self.urls.raw)?;
        let page_url = self
            .links
            .and_then(|l| l.html)
            .unwrap_or_else(|| format!("https://unsplash.com/photos/{}", self.id));

        Some(CandidateImage {
            url,
            page_url,
            source_domain: SOURCE_DOMAIN.to_string(),
            alt: self.alt_description.or(self.description),
            width: self.width,
            height: self.height,
        })
    }
}

/// Searches Unsplash for photos matching a query
///
/// Requires an access key, sent as `Authorization: Client-ID <key>`.
pub struct UnsplashScraper {
    client: Client,
    base_url: String,
    access_key: Option<String>,
}

impl UnsplashScraper {
    pub fn new(client: Client, base_url: &str, access_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key: access_key.filter(|k| !k.is_empty()),
        }
    }

    async fn search_page(&self, key: &str, query: &str, page: usize) -> Result<SearchResponse> {
        let url = format!("{}/search/photos", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Client-ID {}", key))
            .header("Accept-Version", "v1")
            .query(&[
                ("query", query.to_string()),
                ("page", page.to_string()),
                ("per_page", PER_PAGE.to_string()),
            ])
            .send()
            .await
            .map_err(|e| classify_request_error(&url, e))?;

        check_status(&url, response.status())?;

        let body = response
            .json::<SearchResponse>()
            .await
            .map_err(|e| classify_request_error(&url, e))?;
        Ok(body)
    }
}

#[async_trait]
impl Scraper for UnsplashScraper {
    fn name(&self) -> &str {
        "unsplash"
    }

    fn is_configured(&self) -> bool {
        self.access_key.is_some()
    }

    async fn scrape(
        &self,
        query: &str,
        limit: usize,
        _options: &ScrapeOptions,
    ) -> Result<ScrapeOutput> {
        let Some(key) = self.access_key.as_deref() else {
            tracing::warn!("Unsplash access key not configured, skipping query '{}'", query);
            return Ok(ScrapeOutput::default());
        };

        let mut images = Vec::new();
        let mut page = 1;

        while images.len() < limit {
            let response = self.search_page(key, query, page).await?;
            let returned = response.results.len();

            images.extend(
                response
                    .results
                    .into_iter()
                    .filter_map(Photo::into_candidate),
            );

            if returned < PER_PAGE || page as u32 >= response.total_pages {
                break;
            }
            page += 1;
        }

        images.truncate(limit);
        tracing::debug!("Unsplash '{}' returned {} candidates", query, images.len());
        Ok(ScrapeOutput::images(images))
    }
}
