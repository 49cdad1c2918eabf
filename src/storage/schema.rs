//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Gleaner database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Operator-defined sources, synced from configuration
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    query TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    last_scraped_at TEXT,
    total_scraped INTEGER NOT NULL DEFAULT 0,
    crawl_depth INTEGER,
    follow_links INTEGER NOT NULL DEFAULT 0
);

-- Crawl frontier queue
CREATE TABLE IF NOT EXISTS crawl_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    depth INTEGER NOT NULL DEFAULT 0,
    priority INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    discovered_at TEXT NOT NULL,
    last_attempt_at TEXT,
    last_error TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawl_queue_status_priority
    ON crawl_queue(status, priority DESC, discovered_at);

-- Image URLs that produced a post
CREATE TABLE IF NOT EXISTS ingested_images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    image_url TEXT NOT NULL UNIQUE,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    post_id TEXT NOT NULL,
    ingested_at TEXT NOT NULL
);

-- Per-URL failure counts driving the permanent-skip policy
CREATE TABLE IF NOT EXISTS failed_images (
    image_url TEXT PRIMARY KEY,
    fail_count INTEGER NOT NULL DEFAULT 0,
    last_reason TEXT,
    first_failed_at TEXT NOT NULL,
    last_failed_at TEXT NOT NULL
);

-- Diagnostic records for filtered candidates
CREATE TABLE IF NOT EXISTS quality_rejections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER,
    image_url TEXT NOT NULL,
    score INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    reason TEXT NOT NULL,
    rejected_at TEXT NOT NULL
);

-- Counters keyed by calendar day
CREATE TABLE IF NOT EXISTS daily_stats (
    date TEXT PRIMARY KEY,
    images_scraped INTEGER NOT NULL DEFAULT 0,
    images_uploaded INTEGER NOT NULL DEFAULT 0,
    images_failed INTEGER NOT NULL DEFAULT 0,
    quality_filtered INTEGER NOT NULL DEFAULT 0
);

-- One row per orchestrator pass
CREATE TABLE IF NOT EXISTS job_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mode TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    images_scraped INTEGER NOT NULL DEFAULT 0,
    images_uploaded INTEGER NOT NULL DEFAULT 0,
    images_failed INTEGER NOT NULL DEFAULT 0,
    quality_filtered INTEGER NOT NULL DEFAULT 0,
    error TEXT
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
