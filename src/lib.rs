//! Gleaner: an image harvesting engine
//!
//! This crate discovers candidate images from search APIs, static pages and
//! script-rendered pages, filters them for quality, deduplicates them against a
//! durable ledger and hands the survivors to an external ingestion pipeline.

pub mod config;
pub mod filter;
pub mod ingest;
pub mod orchestrator;
pub mod output;
pub mod scrape;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Gleaner operations
#[derive(Debug, Error)]
pub enum GleanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{capability} is not configured: {reason}")]
    NotConfigured {
        capability: &'static str,
        reason: String,
    },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Processing failed for {url}: {message}")]
    Processing { url: String, message: String },

    #[error("Ingestion failed: {0}")]
    Ingest(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl GleanError {
    /// Returns true for failures a later, independent pass may succeed on
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Fetch { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Reqwest(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Gleaner operations
pub type Result<T> = std::result::Result<T, GleanError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{QueueStatus, SourceKind};
pub use crate::url::{extract_domain, normalize_url};
