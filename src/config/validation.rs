use crate::config::types::{
    ApiConfig, Config, IngestConfig, RendererConfig, SchedulerConfig, SourceEntry, StorageConfig,
    UserAgentConfig,
};
use crate::state::SourceKind;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scheduler_config(&config.scheduler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_storage_config(&config.storage)?;
    validate_ingest_config(&config.ingest)?;
    validate_api_config(&config.api)?;
    validate_renderer_config(&config.renderer)?;
    validate_sources(&config.sources)?;
    Ok(())
}

fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch-size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.interval_minutes < 1 {
        return Err(ConfigError::Validation(format!(
            "interval-minutes must be >= 1, got {}",
            config.interval_minutes
        )));
    }

    if config.frontier_batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "frontier-batch-size must be >= 1, got {}",
            config.frontier_batch_size
        )));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.asset_dir.is_empty() {
        return Err(ConfigError::Validation(
            "asset-dir cannot be empty".to_string(),
        ));
    }

    if let Some(base) = &config.public_base_url {
        validate_http_url("public-base-url", base)?;
    }

    Ok(())
}

fn validate_ingest_config(config: &IngestConfig) -> Result<(), ConfigError> {
    validate_http_url("ingest endpoint", &config.endpoint)?;

    if let Some(name) = &config.token_env {
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "token-env cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_http_url("unsplash-base-url", &config.unsplash_base_url)?;
    validate_http_url("reddit-base-url", &config.reddit_base_url)?;
    validate_http_url("reddit-auth-url", &config.reddit_auth_url)?;
    Ok(())
}

fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    if config.navigation_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "navigation-timeout-secs must be >= 1".to_string(),
        ));
    }

    if let Some(remote) = &config.remote_url {
        Url::parse(remote)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid remote-url: {}", e)))?;
    }

    Ok(())
}

/// Validates source entries
///
/// Names must be unique because sources are synced into the database by name.
fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for entry in sources {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        if !names.insert(entry.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                entry.name
            )));
        }

        if entry.query.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' must have a query",
                entry.name
            )));
        }

        match entry.kind {
            SourceKind::Url => validate_http_url("source query", &entry.query)?,
            SourceKind::Unsplash | SourceKind::Reddit => {
                if entry.crawl_depth.is_some() || entry.follow_links.is_some() {
                    return Err(ConfigError::Validation(format!(
                        "source '{}': crawl-depth and follow-links only apply to url sources",
                        entry.name
                    )));
                }
            }
        }
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
