use crate::config::IngestConfig;
use crate::ingest::{PostSink, ProcessedAsset};
use crate::scrape::{check_status, classify_request_error};
use crate::{GleanError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a post creation request
#[derive(Debug, Serialize)]
pub struct PostRequest<'a> {
    pub image_url: &'a str,
    pub width: u32,
    pub height: u32,
    pub source_url: &'a str,
    pub source_domain: &'a str,
    pub tags: &'a [String],
    pub description: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    id: Value,
}

/// Creates posts by POSTing JSON to the ingest endpoint
pub struct HttpPostSink {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpPostSink {
    pub fn new(client: Client, endpoint: &str, token: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Reads the endpoint and bearer token from `[ingest]`
    pub fn from_config(config: &IngestConfig, client: Client) -> Self {
        Self::new(client, &config.endpoint, config.token())
    }
}

/// Accepts string or numeric ids
fn post_id(value: Value) -> Result<String> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(GleanError::Ingest(format!("unexpected post id: {}", other))),
    }
}

#[async_trait]
impl PostSink for HttpPostSink {
    async fn create_post(
        &self,
        asset: &ProcessedAsset,
        source_url: &str,
        source_domain: &str,
        tags: &[String],
        description: Option<&str>,
    ) -> Result<String> {
        let body = PostRequest {
            image_url: &asset.url,
            width: asset.width,
            height: asset.height,
            source_url,
            source_domain,
            tags,
            description,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_request_error(&self.endpoint, e))?;
        check_status(&self.endpoint, response.status())?;

        let created: PostResponse = response
            .json()
            .await
            .map_err(|e| GleanError::Ingest(format!("invalid response: {}", e)))?;

        post_id(created.id)
    }
}
