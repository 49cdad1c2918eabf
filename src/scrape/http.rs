//! HTTP client construction and page fetching
//!
//! All strategies and the default image processor share one client built
//! here, so every request carries the configured user agent.

use crate::config::UserAgentConfig;
use crate::GleanError;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;

/// Timeout for a single plain HTTP request
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_REDIRECTS: usize = 10;

/// A fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,

    pub status_code: u16,
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use gleaner::config::UserAgentConfig;
/// use gleaner::scrape::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "Gleaner".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(FETCH_TIMEOUT)
        .connect_timeout(FETCH_TIMEOUT)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a transport error onto the crate's error taxonomy
pub(crate) fn classify_request_error(url: &str, error: reqwest::Error) -> GleanError {
    if error.is_timeout() {
        GleanError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = error.status() {
        GleanError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        GleanError::Fetch {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// Fails on any non-2xx status
pub(crate) fn check_status(url: &str, status: StatusCode) -> Result<(), GleanError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(GleanError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Fetches an HTML page
///
/// # Error Mapping
///
/// | Condition | Error |
/// |-----------|-------|
/// | Timeout (10s) | `Timeout` |
/// | Non-2xx status | `HttpStatus` |
/// | Non-HTML Content-Type | `Fetch` |
/// | Connection or body error | `Fetch` |
pub async fn fetch_page(client: &Client, url: &str) -> Result<FetchedPage, GleanError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify_request_error(url, e))?;

    let status = response.status();
    check_status(url, status)?;

    let final_url = response.url().to_string();

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !content_type.is_empty()
        && !content_type.contains("text/html")
        && !content_type.contains("application/xhtml")
    {
        return Err(GleanError::Fetch {
            url: url.to_string(),
            message: format!("not an HTML page: {}", content_type),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| classify_request_error(url, e))?;

    Ok(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        body,
    })
}
