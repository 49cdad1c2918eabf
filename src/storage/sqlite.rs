//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::config::SourceEntry;
use crate::state::{QueueStatus, SourceKind};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    stats_key, DailyStats, FailureRecord, FrontierItem, JobRunRecord, NewFrontierItem,
    RejectionRecord, RunCounters, RunStatus, SourceRecord, StatKind, FAILURE_THRESHOLD,
    PERMANENT_SKIP_COUNT,
};
use crate::GleanError;
use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

/// Fixed-width UTC timestamp so text ordering matches time ordering
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

const SOURCE_COLUMNS: &str = "id, name, kind, query, enabled, last_scraped_at, total_scraped, \
                              crawl_depth, follow_links";

const QUEUE_COLUMNS: &str = "id, url, source_id, depth, priority, status, discovered_at, \
                             last_attempt_at, last_error";

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<SourceRecord> {
    let kind: String = row.get(2)?;
    let total_scraped: i64 = row.get(6)?;
    Ok(SourceRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: SourceKind::from_db_string(&kind).unwrap_or(SourceKind::Url),
        query: row.get(3)?,
        enabled: row.get(4)?,
        last_scraped_at: row.get(5)?,
        total_scraped: total_scraped.max(0) as u64,
        crawl_depth: row.get(7)?,
        follow_links: row.get(8)?,
    })
}

fn queue_item_from_row(row: &Row<'_>) -> rusqlite::Result<FrontierItem> {
    let status: String = row.get(5)?;
    Ok(FrontierItem {
        id: row.get(0)?,
        url: row.get(1)?,
        source_id: row.get(2)?,
        depth: row.get(3)?,
        priority: row.get(4)?,
        status: QueueStatus::from_db_string(&status).unwrap_or(QueueStatus::Failed),
        discovered_at: row.get(6)?,
        last_attempt_at: row.get(7)?,
        last_error: row.get(8)?,
    })
}

fn count(value: i64) -> u64 {
    value.max(0) as u64
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(GleanError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, GleanError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, GleanError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    // ===== Sources =====

    fn upsert_source(&mut self, entry: &SourceEntry) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO sources (name, kind, query, enabled, crawl_depth, follow_links)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                kind = excluded.kind,
                query = excluded.query,
                enabled = excluded.enabled,
                crawl_depth = excluded.crawl_depth,
                follow_links = excluded.follow_links",
            params![
                entry.name,
                entry.kind.to_db_string(),
                entry.query,
                entry.enabled,
                entry.crawl_depth,
                entry.follow_links.unwrap_or(false),
            ],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM sources WHERE name = ?1",
            params![entry.name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn disable_sources_except(&mut self, names: &[&str]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut disabled = 0;
        {
            let mut select = tx.prepare("SELECT id, name FROM sources WHERE enabled = 1")?;
            let rows: Vec<(i64, String)> = select
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<_, _>>()?;

            for (id, name) in rows {
                if !names.contains(&name.as_str()) {
                    disabled += tx.execute(
                        "UPDATE sources SET enabled = 0 WHERE id = ?1",
                        params![id],
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(disabled)
    }

    fn get_source(&self, source_id: i64) -> StorageResult<SourceRecord> {
        let sql = format!("SELECT {} FROM sources WHERE id = ?1", SOURCE_COLUMNS);
        self.conn
            .query_row(&sql, params![source_id], source_from_row)
            .optional()?
            .ok_or(StorageError::SourceNotFound(source_id))
    }

    fn enabled_sources(&self) -> StorageResult<Vec<SourceRecord>> {
        let sql = format!(
            "SELECT {} FROM sources WHERE enabled = 1 ORDER BY id",
            SOURCE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    fn update_source_stats(&mut self, source_id: i64, scraped: u64) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE sources
             SET total_scraped = total_scraped + ?1, last_scraped_at = ?2
             WHERE id = ?3",
            params![scraped as i64, now_timestamp(), source_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SourceNotFound(source_id));
        }
        Ok(())
    }

    // ===== Frontier =====

    fn enqueue(&mut self, items: &[NewFrontierItem]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO crawl_queue (url, source_id, depth, priority, status, discovered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for item in items {
                inserted += stmt.execute(params![
                    item.url,
                    item.source_id,
                    item.depth,
                    item.priority,
                    QueueStatus::Pending.to_db_string(),
                    now_timestamp(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn dequeue_batch(&self, limit: usize) -> StorageResult<Vec<FrontierItem>> {
        let sql = format!(
            "SELECT {} FROM crawl_queue
             WHERE status = ?1
               AND source_id IN (
                   SELECT id FROM sources
                   WHERE enabled = 1 AND kind = ?2 AND crawl_depth IS NOT NULL
               )
             ORDER BY priority DESC, discovered_at ASC, id ASC
             LIMIT ?3",
            QUEUE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(
                params![
                    QueueStatus::Pending.to_db_string(),
                    SourceKind::Url.to_db_string(),
                    limit as i64
                ],
                queue_item_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn mark_done(
        &mut self,
        item_id: i64,
        status: QueueStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        if !status.is_terminal() {
            return Err(StorageError::InvalidTransition {
                id: item_id,
                to: status,
            });
        }

        let updated = self.conn.execute(
            "UPDATE crawl_queue SET status = ?1, last_attempt_at = ?2, last_error = ?3 WHERE id = ?4",
            params![status.to_db_string(), now_timestamp(), error, item_id],
        )?;
        if updated == 0 {
            return Err(StorageError::ItemNotFound(item_id));
        }
        Ok(())
    }

    fn is_queued(&self, url: &str) -> StorageResult<bool> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM crawl_queue WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    fn frontier_counts(&self) -> StorageResult<HashMap<QueueStatus, u64>> {
        let mut counts: HashMap<QueueStatus, u64> =
            QueueStatus::all_states().into_iter().map(|s| (s, 0)).collect();

        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM crawl_queue GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, n) = row?;
            if let Some(status) = QueueStatus::from_db_string(&status) {
                *counts.entry(status).or_insert(0) += count(n);
            }
        }
        Ok(counts)
    }

    fn reset_failed_items(&mut self) -> StorageResult<usize> {
        let reset = self.conn.execute(
            "UPDATE crawl_queue SET status = ?1, last_error = NULL WHERE status = ?2",
            params![
                QueueStatus::Pending.to_db_string(),
                QueueStatus::Failed.to_db_string()
            ],
        )?;
        Ok(reset)
    }

    // ===== Ledger =====

    fn is_already_ingested(&self, image_url: &str) -> StorageResult<bool> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM ingested_images WHERE image_url = ?1",
                params![image_url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    fn is_permanently_failed(&self, image_url: &str) -> StorageResult<bool> {
        let fail_count: Option<u32> = self
            .conn
            .query_row(
                "SELECT fail_count FROM failed_images WHERE image_url = ?1",
                params![image_url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(fail_count.map_or(false, |n| n >= FAILURE_THRESHOLD))
    }

    fn record_success(
        &mut self,
        source_id: i64,
        image_url: &str,
        post_id: &str,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO ingested_images (image_url, source_id, post_id, ingested_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![image_url, source_id, post_id, now_timestamp()],
        )?;
        Ok(())
    }

    fn record_failure(&mut self, image_url: &str, reason: &str) -> StorageResult<u32> {
        let now = now_timestamp();
        let fail_count = self.conn.query_row(
            "INSERT INTO failed_images (image_url, fail_count, last_reason, first_failed_at, last_failed_at)
             VALUES (?1, 1, ?2, ?3, ?3)
             ON CONFLICT(image_url) DO UPDATE SET
                fail_count = fail_count + 1,
                last_reason = excluded.last_reason,
                last_failed_at = excluded.last_failed_at
             RETURNING fail_count",
            params![image_url, reason, now],
            |row| row.get(0),
        )?;
        Ok(fail_count)
    }

    fn get_failure(&self, image_url: &str) -> StorageResult<Option<FailureRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT image_url, fail_count, last_reason, first_failed_at, last_failed_at
                 FROM failed_images WHERE image_url = ?1",
                params![image_url],
                |row| {
                    Ok(FailureRecord {
                        url: row.get(0)?,
                        fail_count: row.get(1)?,
                        last_reason: row.get(2)?,
                        first_failed_at: row.get(3)?,
                        last_failed_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn reset_failure(&mut self, image_url: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE failed_images SET fail_count = 0 WHERE image_url = ?1",
            params![image_url],
        )?;
        Ok(())
    }

    fn force_permanent_skip(&mut self, image_url: &str, reason: &str) -> StorageResult<()> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO failed_images (image_url, fail_count, last_reason, first_failed_at, last_failed_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(image_url) DO UPDATE SET
                fail_count = excluded.fail_count,
                last_reason = excluded.last_reason,
                last_failed_at = excluded.last_failed_at",
            params![image_url, PERMANENT_SKIP_COUNT, reason, now],
        )?;
        Ok(())
    }

    fn record_rejection(&mut self, rejection: &RejectionRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO quality_rejections (source_id, image_url, score, content_type, reason, rejected_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                rejection.source_id,
                rejection.url,
                rejection.score,
                rejection.content_type,
                rejection.reason,
                now_timestamp(),
            ],
        )?;
        Ok(())
    }

    // ===== Statistics =====

    fn increment_stat(
        &mut self,
        kind: StatKind,
        date: NaiveDate,
        amount: u64,
    ) -> StorageResult<()> {
        // Column names come from a closed enum, never from input
        let sql = format!(
            "INSERT INTO daily_stats (date, {col}) VALUES (?1, ?2)
             ON CONFLICT(date) DO UPDATE SET {col} = {col} + excluded.{col}",
            col = kind.column()
        );
        self.conn
            .execute(&sql, params![stats_key(date), amount as i64])?;
        Ok(())
    }

    fn daily_stats(&self, date: NaiveDate) -> StorageResult<DailyStats> {
        let key = stats_key(date);
        let stats = self
            .conn
            .query_row(
                "SELECT images_scraped, images_uploaded, images_failed, quality_filtered
                 FROM daily_stats WHERE date = ?1",
                params![key],
                |row| {
                    Ok(DailyStats {
                        date: key.clone(),
                        images_scraped: count(row.get(0)?),
                        images_uploaded: count(row.get(1)?),
                        images_failed: count(row.get(2)?),
                        quality_filtered: count(row.get(3)?),
                    })
                },
            )
            .optional()?;

        Ok(stats.unwrap_or(DailyStats {
            date: key,
            ..DailyStats::default()
        }))
    }

    fn count_ingested(&self) -> StorageResult<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ingested_images", [], |row| row.get(0))?;
        Ok(count(n))
    }

    fn count_permanent_failures(&self) -> StorageResult<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM failed_images WHERE fail_count >= ?1",
            params![FAILURE_THRESHOLD],
            |row| row.get(0),
        )?;
        Ok(count(n))
    }

    fn count_rejections(&self) -> StorageResult<u64> {
        let n: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM quality_rejections", [], |row| {
                    row.get(0)
                })?;
        Ok(count(n))
    }

    // ===== Job Runs =====

    fn create_job_run(&mut self, mode: &str, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO job_runs (mode, started_at, status, config_hash) VALUES (?1, ?2, ?3, ?4)",
            params![
                mode,
                now_timestamp(),
                RunStatus::Running.to_db_string(),
                config_hash
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_job_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE job_runs
             SET status = ?1, finished_at = ?2, images_scraped = ?3, images_uploaded = ?4,
                 images_failed = ?5, quality_filtered = ?6, error = ?7
             WHERE id = ?8",
            params![
                status.to_db_string(),
                now_timestamp(),
                counters.scraped as i64,
                counters.uploaded as i64,
                counters.failed as i64,
                counters.filtered as i64,
                error,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn interrupt_running_job_runs(&mut self) -> StorageResult<usize> {
        let updated = self.conn.execute(
            "UPDATE job_runs SET status = ?1, finished_at = ?2 WHERE status = ?3",
            params![
                RunStatus::Interrupted.to_db_string(),
                now_timestamp(),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(updated)
    }

    fn recent_job_runs(&self, limit: usize) -> StorageResult<Vec<JobRunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mode, started_at, finished_at, status, config_hash,
                    images_scraped, images_uploaded, images_failed, quality_filtered, error
             FROM job_runs ORDER BY id DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(JobRunRecord {
                    id: row.get(0)?,
                    mode: row.get(1)?,
                    started_at: row.get(2)?,
                    finished_at: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Failed),
                    config_hash: row.get(5)?,
                    counters: RunCounters {
                        scraped: count(row.get(6)?),
                        uploaded: count(row.get(7)?),
                        failed: count(row.get(8)?),
                        filtered: count(row.get(9)?),
                    },
                    error: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}
