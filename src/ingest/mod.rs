//! Hand-off to the external ingestion pipeline
//!
//! An accepted candidate is first turned into a stored asset by an
//! [`ImageProcessor`], then published as a post through a [`PostSink`].
//!
//! # Components
//!
//! - `processor`: download, dimension check and asset storage
//! - `sink`: JSON post creation against the configured endpoint

mod processor;
mod sink;

pub use processor::{asset_file_name, DownloadProcessor, MAX_IMAGE_BYTES};
pub use sink::{HttpPostSink, PostRequest};

use crate::scrape::CandidateImage;
use crate::Result;
use async_trait::async_trait;

/// An image stored where the ingestion pipeline can reach it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedAsset {
    /// Public URL of the stored image
    pub url: String,

    /// Real pixel dimensions, read from the image data
    pub width: u32,
    pub height: u32,
}

/// Turns a candidate into a stored asset
#[async_trait]
pub trait ImageProcessor: Send + Sync {
    /// Fetches and stores the candidate
    ///
    /// # Returns
    ///
    /// * `Ok(Some(asset))` - The image was stored
    /// * `Ok(None)` - The image turned out unusable once downloaded
    /// * `Err(GleanError)` - The download or write failed
    async fn process(&self, candidate: &CandidateImage) -> Result<Option<ProcessedAsset>>;
}

/// Publishes processed assets as posts
#[async_trait]
pub trait PostSink: Send + Sync {
    /// Creates a post and returns its external id
    async fn create_post(
        &self,
        asset: &ProcessedAsset,
        source_url: &str,
        source_domain: &str,
        tags: &[String],
        description: Option<&str>,
    ) -> Result<String>;
}
