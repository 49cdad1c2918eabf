use crate::state::SourceKind;
use serde::Deserialize;

/// Main configuration structure for Gleaner
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

/// Batch sizing and trigger cadence
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Images requested per batch pass, split across enabled sources
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: u32,

    /// Minutes between scheduled passes
    #[serde(rename = "interval-minutes", default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Queue items drained per frontier pass
    #[serde(rename = "frontier-batch-size", default = "default_frontier_batch_size")]
    pub frontier_batch_size: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_minutes: default_interval_minutes(),
            frontier_batch_size: default_frontier_batch_size(),
        }
    }
}

fn default_batch_size() -> u32 {
    20
}

fn default_interval_minutes() -> u64 {
    60
}

fn default_frontier_batch_size() -> u32 {
    10
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Local persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database holding the frontier and ledger
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory downloaded assets are written to
    #[serde(rename = "asset-dir")]
    pub asset_dir: String,

    /// Public URL prefix under which `asset-dir` is served
    #[serde(rename = "public-base-url", default)]
    pub public_base_url: Option<String>,
}

/// External post ingestion endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// URL posts are created at
    pub endpoint: String,

    /// Environment variable holding a bearer token for the endpoint
    #[serde(rename = "token-env", default)]
    pub token_env: Option<String>,
}

impl IngestConfig {
    /// Reads the bearer token from the environment, if one is configured
    pub fn token(&self) -> Option<String> {
        self.token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|v| !v.is_empty())
    }
}

/// Query API endpoints and credential variable names
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(rename = "unsplash-base-url", default = "default_unsplash_base_url")]
    pub unsplash_base_url: String,

    #[serde(rename = "unsplash-key-env", default = "default_unsplash_key_env")]
    pub unsplash_key_env: String,

    #[serde(rename = "reddit-base-url", default = "default_reddit_base_url")]
    pub reddit_base_url: String,

    #[serde(rename = "reddit-auth-url", default = "default_reddit_auth_url")]
    pub reddit_auth_url: String,

    #[serde(rename = "reddit-client-id-env", default = "default_reddit_client_id_env")]
    pub reddit_client_id_env: String,

    #[serde(
        rename = "reddit-client-secret-env",
        default = "default_reddit_client_secret_env"
    )]
    pub reddit_client_secret_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            unsplash_base_url: default_unsplash_base_url(),
            unsplash_key_env: default_unsplash_key_env(),
            reddit_base_url: default_reddit_base_url(),
            reddit_auth_url: default_reddit_auth_url(),
            reddit_client_id_env: default_reddit_client_id_env(),
            reddit_client_secret_env: default_reddit_client_secret_env(),
        }
    }
}

fn default_unsplash_base_url() -> String {
    "https://api.unsplash.com".to_string()
}

fn default_unsplash_key_env() -> String {
    "UNSPLASH_ACCESS_KEY".to_string()
}

fn default_reddit_base_url() -> String {
    "https://oauth.reddit.com".to_string()
}

fn default_reddit_auth_url() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}

fn default_reddit_client_id_env() -> String {
    "REDDIT_CLIENT_ID".to_string()
}

fn default_reddit_client_secret_env() -> String {
    "REDDIT_CLIENT_SECRET".to_string()
}

/// Render session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,

    #[serde(
        rename = "navigation-timeout-secs",
        default = "default_navigation_timeout"
    )]
    pub navigation_timeout_secs: u64,

    /// Explicit Chrome/Chromium binary; searched for when unset
    #[serde(rename = "chrome-executable", default)]
    pub chrome_executable: Option<String>,

    /// DevTools websocket of an already running browser
    #[serde(rename = "remote-url", default)]
    pub remote_url: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            navigation_timeout_secs: default_navigation_timeout(),
            chrome_executable: None,
            remote_url: None,
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_navigation_timeout() -> u64 {
    30
}

/// Operator-defined source, synced into the database at startup
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    /// Unique operator-facing name
    pub name: String,

    pub kind: SourceKind,

    /// Search term, subreddit name, or page URL depending on `kind`
    pub query: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum hops from the seed; makes a `url` source crawlable when set
    #[serde(rename = "crawl-depth", default)]
    pub crawl_depth: Option<u32>,

    /// Follow links to other domains while crawling
    #[serde(rename = "follow-links", default)]
    pub follow_links: Option<bool>,
}

fn default_enabled() -> bool {
    true
}
