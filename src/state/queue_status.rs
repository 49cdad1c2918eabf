/// Queue status definitions for crawl frontier items
///
/// Only the durable states are represented here. An item being worked on is
/// tracked in memory by the orchestrator; the single-consumer loop never needs
/// a persisted claim.
use std::fmt;

/// Represents the durable state of a crawl queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    /// Waiting to be visited
    Pending,

    /// Visited successfully
    Completed,

    /// Visit raised an error; not retried automatically
    Failed,
}

impl QueueStatus {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Rows written as `processing` by older tooling are read back as pending.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" | "processing" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all durable statuses
    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::Completed, Self::Failed]
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
