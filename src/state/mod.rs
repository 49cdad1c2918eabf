//! State module for frontier items and sources
//!
//! # Components
//!
//! - `QueueStatus`: durable status of a crawl queue item (pending, completed, failed)
//! - `SourceKind`: which scraping strategy a configured source is dispatched to

mod queue_status;
mod source_kind;

// Re-export main types
pub use queue_status::QueueStatus;
pub use source_kind::SourceKind;
