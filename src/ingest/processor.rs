use crate::config::StorageConfig;
use crate::filter::MIN_DIMENSION;
use crate::ingest::{ImageProcessor, ProcessedAsset};
use crate::scrape::{check_status, classify_request_error, CandidateImage, FETCH_TIMEOUT};
use crate::{GleanError, Result};
use async_trait::async_trait;
use image::ImageReader;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::PathBuf;

/// Largest image body the processor will buffer
pub const MAX_IMAGE_BYTES: u64 = 25 * 1024 * 1024;

/// Downloads candidates into a local asset directory
///
/// Files are named by the SHA-256 of the image URL, so a re-download of the
/// same URL overwrites rather than duplicates.
pub struct DownloadProcessor {
    client: Client,
    asset_dir: PathBuf,
    public_base_url: Option<String>,
    max_bytes: u64,
}

impl DownloadProcessor {
    pub fn new(
        client: Client,
        asset_dir: impl Into<PathBuf>,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            client,
            asset_dir: asset_dir.into(),
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    /// Overrides the body size limit
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn too_large(&self, url: &str) -> GleanError {
        GleanError::Processing {
            url: url.to_string(),
            message: format!("image larger than {} bytes", self.max_bytes),
        }
    }

    pub fn from_config(config: &StorageConfig, client: Client) -> Self {
        Self::new(client, &config.asset_dir, config.public_base_url.clone())
    }

    fn public_url(&self, file_name: &str, path: &std::path::Path) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, file_name),
            None => path.display().to_string(),
        }
    }
}

/// File name for a stored asset: hex SHA-256 of the URL plus an extension
pub fn asset_file_name(url: &str, extension: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("{}.{}", hex::encode(digest), extension)
}

/// Extension for an `image/*` content type
fn extension_for(content_type: &str) -> &'static str {
    let subtype = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches("image/");
    match subtype {
        "jpeg" | "jpg" | "pjpeg" => "jpg",
        "png" => "png",
        "webp" => "webp",
        "gif" => "gif",
        "avif" => "avif",
        "bmp" => "bmp",
        _ => "img",
    }
}

#[async_trait]
impl ImageProcessor for DownloadProcessor {
    async fn process(&self, candidate: &CandidateImage) -> Result<Option<ProcessedAsset>> {
        let url = candidate.url.as_str();

        let mut response = self
            .client
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| classify_request_error(url, e))?;
        check_status(url, response.status())?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.starts_with("image/") {
            return Err(GleanError::Processing {
                url: url.to_string(),
                message: format!("not an image (content type '{}')", content_type),
            });
        }

        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large(url));
        }

        // Content-Length can be absent or wrong, so count while reading
        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify_request_error(url, e))?
        {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(self.too_large(url));
            }
            bytes.extend_from_slice(&chunk);
        }

        let (width, height) = ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| GleanError::Processing {
                url: url.to_string(),
                message: format!("unreadable image: {}", e),
            })?;

        if width < MIN_DIMENSION || height < MIN_DIMENSION {
            tracing::debug!("Downloaded {} is only {}x{}, dropping", url, width, height);
            return Ok(None);
        }

        tokio::fs::create_dir_all(&self.asset_dir).await?;
        let file_name = asset_file_name(url, extension_for(&content_type));
        let path = self.asset_dir.join(&file_name);
        tokio::fs::write(&path, &bytes).await?;

        tracing::debug!("Stored {} ({}x{}) as {}", url, width, height, path.display());

        Ok(Some(ProcessedAsset {
            url: self.public_url(&file_name, &path),
            width,
            height,
        }))
    }
}
