//! Reddit subreddit listings
//!
//! Authenticates with the OAuth client-credentials grant and reads a
//! subreddit's `hot` listing, keeping only posts that link directly to an
//! image.

use crate::scrape::http::{check_status, classify_request_error};
use crate::scrape::{CandidateImage, ScrapeOptions, ScrapeOutput, Scraper};
use crate::{GleanError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Listing page size; the API maximum
const PAGE_LIMIT: usize = 100;

/// Refresh the token this long before it expires
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];

const IMAGE_HOSTS: &[&str] = &["i.redd.it", "i.imgur.com"];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    url: Option<String>,
    title: Option<String>,
    permalink: String,
    post_hint: Option<String>,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    over_18: bool,
    preview: Option<Preview>,
}

#[derive(Debug, Deserialize)]
struct Preview {
    #[serde(default)]
    images: Vec<PreviewImage>,
}

#[derive(Debug, Deserialize)]
struct PreviewImage {
    source: PreviewSource,
}

#[derive(Debug, Deserialize)]
struct PreviewSource {
    width: Option<u32>,
    height: Option<u32>,
}

impl Post {
    fn is_image(&self, url: &str) -> bool {
        if self.post_hint.as_deref() == Some("image") {
            return true;
        }
        let lower = url.to_lowercase();
        let path = lower.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
        IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
            || IMAGE_HOSTS.iter().any(|host| lower.contains(host))
    }

    fn into_candidate(self) -> Option<CandidateImage> {
        if self.is_self || self.over_18 {
            return None;
        }
        let url = self.url.clone()?;
        if !self.is_image(&url) {
            return None;
        }

        let source = self
            .preview
            .as_ref()
            .and_then(|p| p.images.first())
            .map(|i| &i.source);

        Some(CandidateImage {
            url,
            page_url: format!("https://www.reddit.com{}", self.permalink),
            source_domain: "reddit.com".to_string(),
            alt: self.title,
            width: source.and_then(|s| s.width),
            height: source.and_then(|s| s.height),
        })
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Reads image posts from a subreddit
pub struct RedditScraper {
    client: Client,
    base_url: String,
    auth_url: String,
    credentials: Option<(String, String)>,
    token: Mutex<Option<CachedToken>>,
}

impl RedditScraper {
    pub fn new(
        client: Client,
        base_url: &str,
        auth_url: &str,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        let credentials = match (client_id, client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        };

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_url: auth_url.to_string(),
            credentials,
            token: Mutex::new(None),
        }
    }

    /// Returns a cached token, requesting a new one when missing or expiring
    async fn access_token(&self, id: &str, secret: &str) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(&self.auth_url)
            .basic_auth(id, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| classify_request_error(&self.auth_url, e))?;
        check_status(&self.auth_url, response.status())?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| classify_request_error(&self.auth_url, e))?;

        tracing::debug!("Obtained Reddit token valid for {}s", token.expires_in);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }

    async fn listing_page(
        &self,
        token: &str,
        subreddit: &str,
        after: Option<&str>,
    ) -> Result<ListingData> {
        let url = format!("{}/r/{}/hot", self.base_url, subreddit);
        let mut request = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("limit", PAGE_LIMIT.to_string()), ("raw_json", "1".to_string())]);
        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_request_error(&url, e))?;
        check_status(&url, response.status())?;

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| classify_request_error(&url, e))?;
        Ok(listing.data)
    }
}

/// Accepts `EarthPorn`, `r/EarthPorn` and `/r/EarthPorn/`
fn subreddit_name(query: &str) -> Result<&str> {
    let name = query
        .trim()
        .trim_matches('/')
        .trim_start_matches("r/")
        .trim_matches('/');
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(GleanError::Fetch {
            url: query.to_string(),
            message: "invalid subreddit name".to_string(),
        });
    }
    Ok(name)
}

#[async_trait]
impl Scraper for RedditScraper {
    fn name(&self) -> &str {
        "reddit"
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn scrape(
        &self,
        query: &str,
        limit: usize,
        _options: &ScrapeOptions,
    ) -> Result<ScrapeOutput> {
        let Some((id, secret)) = self.credentials.as_ref() else {
            tracing::warn!("Reddit credentials not configured, skipping '{}'", query);
            return Ok(ScrapeOutput::default());
        };

        let subreddit = subreddit_name(query)?;
        let token = self.access_token(id, secret).await?;

        let mut images = Vec::new();
        let mut after: Option<String> = None;

        while images.len() < limit {
            let page = self
                .listing_page(&token, subreddit, after.as_deref())
                .await?;
            let returned = page.children.len();

            images.extend(page.children.into_iter().filter_map(|c| c.data.into_candidate()));

            after = page.after;
            if returned == 0 || after.is_none() {
                break;
            }
        }

        images.truncate(limit);
        tracing::debug!("r/{} returned {} candidates", subreddit, images.len());
        Ok(ScrapeOutput::images(images))
    }
}
