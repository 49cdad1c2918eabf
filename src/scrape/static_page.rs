use crate::scrape::html::extract_page_images;
use crate::scrape::http::fetch_page;
use crate::scrape::{ScrapeOptions, ScrapeOutput, Scraper};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

/// Scrapes the images embedded in a single page
pub struct StaticPageScraper {
    client: Client,
}

impl StaticPageScraper {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Scraper for StaticPageScraper {
    fn name(&self) -> &str {
        "static-page"
    }

    async fn scrape(
        &self,
        page_url: &str,
        limit: usize,
        _options: &ScrapeOptions,
    ) -> Result<ScrapeOutput> {
        let page = fetch_page(&self.client, page_url).await?;
        let final_url = Url::parse(&page.final_url)?;

        let mut parsed = extract_page_images(&page.body, &final_url);
        parsed.images.truncate(limit);

        tracing::debug!(
            "Static page {} yielded {} candidates and {} links",
            final_url,
            parsed.images.len(),
            parsed.links.len()
        );

        Ok(ScrapeOutput {
            images: parsed.images,
            links: parsed.links,
        })
    }
}
