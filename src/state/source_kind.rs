use serde::{Deserialize, Serialize};
use std::fmt;

/// The origin type of a configured source
///
/// The kind decides which scraper a source is dispatched to:
/// - `Unsplash`: query string is a search term
/// - `Reddit`: query string is a subreddit name
/// - `Url`: query string is a page URL (static, or a crawl seed when a depth is set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Unsplash,
    Reddit,
    Url,
}

impl SourceKind {
    /// Returns true if the kind is backed by a query API
    pub fn is_query_api(&self) -> bool {
        matches!(self, Self::Unsplash | Self::Reddit)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Unsplash => "unsplash",
            Self::Reddit => "reddit",
            Self::Url => "url",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "unsplash" => Some(Self::Unsplash),
            "reddit" => Some(Self::Reddit),
            "url" => Some(Self::Url),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
