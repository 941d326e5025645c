//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::catalog::{CatalogRecord, Change, ChangeKind, Price};
use crate::state::{CrawlCounters, CrawlCursor, CrawlState, RunStatus, CRAWLER_STATE_TYPE};
use crate::storage::query::{ChangeQuery, ItemPage, ItemQuery};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult, UpsertOutcome};
use crate::storage::{DetectionRunRecord, DetectionRunStatus, PendingDetection};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::collections::HashMap;
use std::path::Path;

const ITEM_COLUMNS: &str = "url, title, category, description, price_excl_tax, price_incl_tax, \
     availability, num_reviews, rating, image_url, last_crawled, fingerprint";

const CHANGE_COLUMNS: &str =
    "id, item_url, kind, prior_value, new_value, detected_at, item_title, run_id";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
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
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
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

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CatalogRecord> {
    let last_crawled: String = row.get(10)?;
    Ok(CatalogRecord {
        url: row.get(0)?,
        title: row.get(1)?,
        category: row.get(2)?,
        description: row.get(3)?,
        price_excl_tax: Price::from_minor_units(row.get(4)?),
        price_incl_tax: Price::from_minor_units(row.get(5)?),
        availability: row.get(6)?,
        num_reviews: row.get(7)?,
        rating: row.get(8)?,
        image_url: row.get(9)?,
        last_crawled: parse_timestamp(10, &last_crawled)?,
        fingerprint: row.get(11)?,
        raw_html: None,
    })
}

fn row_to_change(row: &Row<'_>) -> rusqlite::Result<Change> {
    let kind_str: String = row.get(2)?;
    let kind = ChangeKind::from_db_string(&kind_str).ok_or_else(|| {
        conversion_error(2, StorageError::Database(format!("unknown change kind: {}", kind_str)))
    })?;

    let prior = row
        .get::<_, Option<String>>(3)?
        .map(|json| serde_json::from_str(&json).map_err(|e| conversion_error(3, e)))
        .transpose()?;
    let new_json: String = row.get(4)?;
    let new = serde_json::from_str(&new_json).map_err(|e| conversion_error(4, e))?;
    let detected_at: String = row.get(5)?;

    Ok(Change {
        id: Some(row.get(0)?),
        item_url: row.get(1)?,
        kind,
        prior,
        new,
        detected_at: parse_timestamp(5, &detected_at)?,
        item_title: row.get(6)?,
        run_id: row.get(7)?,
    })
}

fn row_to_detection_run(row: &Row<'_>) -> rusqlite::Result<DetectionRunRecord> {
    let status: String = row.get(6)?;
    Ok(DetectionRunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        items_scanned: row.get::<_, i64>(3)? as u64,
        changes_found: row.get::<_, i64>(4)? as u64,
        items_failed: row.get::<_, i64>(5)? as u64,
        status: DetectionRunStatus::from_db_string(&status).unwrap_or(DetectionRunStatus::Failed),
    })
}

fn enqueue_detection(
    tx: &Transaction<'_>,
    url: &str,
    prior: Option<&CatalogRecord>,
) -> StorageResult<()> {
    let snapshot = prior.map(serde_json::to_string).transpose()?;
    // An existing entry keeps its older prior
    tx.execute(
        "INSERT OR IGNORE INTO pending_changes (item_url, prior_snapshot, queued_at)
         VALUES (?1, ?2, ?3)",
        params![url, snapshot, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

impl Storage for SqliteStorage {
    // ===== Items =====

    fn upsert_item(&mut self, record: &CatalogRecord) -> StorageResult<UpsertOutcome> {
        let tx = self.conn.transaction()?;

        let existing = tx
            .query_row(
                &format!("SELECT {} FROM items WHERE url = ?1", ITEM_COLUMNS),
                params![record.url],
                row_to_record,
            )
            .optional()?;

        let outcome = match existing {
            Some(prior) if prior.fingerprint == record.fingerprint => {
                // Dropping the transaction rolls back the (empty) read
                return Ok(UpsertOutcome::Unchanged);
            }
            Some(prior) => {
                tx.execute(
                    "UPDATE items SET title = ?2, category = ?3, description = ?4,
                        price_excl_tax = ?5, price_incl_tax = ?6, availability = ?7,
                        num_reviews = ?8, rating = ?9, image_url = ?10,
                        last_crawled = ?11, fingerprint = ?12, raw_html = ?13
                     WHERE url = ?1",
                    params![
                        record.url,
                        record.title,
                        record.category,
                        record.description,
                        record.price_excl_tax.minor_units(),
                        record.price_incl_tax.minor_units(),
                        record.availability,
                        record.num_reviews,
                        record.rating,
                        record.image_url,
                        record.last_crawled.to_rfc3339(),
                        record.fingerprint,
                        record.raw_html,
                    ],
                )?;
                enqueue_detection(&tx, &record.url, Some(&prior))?;
                UpsertOutcome::Updated {
                    prior: Box::new(prior),
                }
            }
            None => {
                tx.execute(
                    &format!(
                        "INSERT INTO items ({}, raw_html)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                        ITEM_COLUMNS
                    ),
                    params![
                        record.url,
                        record.title,
                        record.category,
                        record.description,
                        record.price_excl_tax.minor_units(),
                        record.price_incl_tax.minor_units(),
                        record.availability,
                        record.num_reviews,
                        record.rating,
                        record.image_url,
                        record.last_crawled.to_rfc3339(),
                        record.fingerprint,
                        record.raw_html,
                    ],
                )?;
                enqueue_detection(&tx, &record.url, None)?;
                UpsertOutcome::Inserted
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn get_item(&self, url: &str) -> StorageResult<Option<CatalogRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM items WHERE url = ?1", ITEM_COLUMNS),
                params![url],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn get_raw_html(&self, url: &str) -> StorageResult<Option<String>> {
        let html: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT raw_html FROM items WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(html.flatten())
    }

    fn list_items(&self, query: &ItemQuery) -> StorageResult<ItemPage> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(category) = &query.category {
            clauses.push("category = ? COLLATE NOCASE");
            values.push(Value::Text(category.clone()));
        }
        if let Some(min) = query.min_price {
            clauses.push("price_incl_tax >= ?");
            values.push(Value::Integer(min.minor_units()));
        }
        if let Some(max) = query.max_price {
            clauses.push("price_incl_tax <= ?");
            values.push(Value::Integer(max.minor_units()));
        }
        if let Some(rating) = query.min_rating {
            clauses.push("rating >= ?");
            values.push(Value::Integer(i64::from(rating)));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM items{}", where_sql),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let direction = if query.descending { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {} FROM items{} ORDER BY {} {}, url ASC LIMIT ? OFFSET ?",
            ITEM_COLUMNS,
            where_sql,
            query.sort.column(),
            direction
        );
        values.push(Value::Integer(query.limit as i64));
        values.push(Value::Integer(query.offset() as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ItemPage {
            items,
            total: total as u64,
            page: query.page.max(1),
            limit: query.limit,
        })
    }

    // ===== Crawl State =====

    fn load_crawl_state(&self) -> StorageResult<CrawlState> {
        let state = self
            .conn
            .query_row(
                "SELECT status, cursor_category, cursor_page, cursor_page_url, last_item_url,
                        total_processed, pages_processed, pages_failed, items_new,
                        items_updated, items_unchanged, fetch_failures, parse_failures,
                        store_failures, started_at, updated_at, last_error
                 FROM crawl_state WHERE state_type = ?1",
                params![CRAWLER_STATE_TYPE],
                |row| {
                    let status_str: String = row.get(0)?;
                    let status = RunStatus::from_db_string(&status_str).ok_or_else(|| {
                        conversion_error(
                            0,
                            StorageError::Database(format!("unknown run status: {}", status_str)),
                        )
                    })?;

                    let category: Option<String> = row.get(1)?;
                    let page: Option<u32> = row.get(2)?;
                    let page_url: Option<String> = row.get(3)?;
                    let cursor = match (category, page, page_url) {
                        (Some(category), Some(page), Some(page_url)) => Some(CrawlCursor {
                            category,
                            page,
                            page_url,
                        }),
                        _ => None,
                    };

                    let count = |idx: usize| -> rusqlite::Result<u64> {
                        Ok(row.get::<_, i64>(idx)? as u64)
                    };
                    let counters = CrawlCounters {
                        items_processed: count(5)?,
                        pages_processed: count(6)?,
                        pages_failed: count(7)?,
                        items_new: count(8)?,
                        items_updated: count(9)?,
                        items_unchanged: count(10)?,
                        fetch_failures: count(11)?,
                        parse_failures: count(12)?,
                        store_failures: count(13)?,
                    };

                    let started_at = row
                        .get::<_, Option<String>>(14)?
                        .map(|s| parse_timestamp(14, &s))
                        .transpose()?;
                    let updated_at: String = row.get(15)?;

                    Ok(CrawlState {
                        status,
                        cursor,
                        last_item_url: row.get(4)?,
                        counters,
                        started_at,
                        updated_at: parse_timestamp(15, &updated_at)?,
                        last_error: row.get(16)?,
                    })
                },
            )
            .optional()?;

        Ok(state.unwrap_or_default())
    }

    fn save_crawl_state(&mut self, state: &CrawlState) -> StorageResult<()> {
        let cursor = state.cursor.as_ref();
        let c = &state.counters;
        self.conn.execute(
            "INSERT OR REPLACE INTO crawl_state (
                state_type, status, cursor_category, cursor_page, cursor_page_url,
                last_item_url, total_processed, pages_processed, pages_failed, items_new,
                items_updated, items_unchanged, fetch_failures, parse_failures,
                store_failures, started_at, updated_at, last_error
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                CRAWLER_STATE_TYPE,
                state.status.to_db_string(),
                cursor.map(|c| c.category.as_str()),
                cursor.map(|c| c.page),
                cursor.map(|c| c.page_url.as_str()),
                state.last_item_url,
                c.items_processed as i64,
                c.pages_processed as i64,
                c.pages_failed as i64,
                c.items_new as i64,
                c.items_updated as i64,
                c.items_unchanged as i64,
                c.fetch_failures as i64,
                c.parse_failures as i64,
                c.store_failures as i64,
                state.started_at.map(|t| t.to_rfc3339()),
                state.updated_at.to_rfc3339(),
                state.last_error,
            ],
        )?;
        Ok(())
    }

    // ===== Change Detection =====

    fn max_pending_id(&self) -> StorageResult<Option<i64>> {
        let max: Option<i64> =
            self.conn
                .query_row("SELECT MAX(id) FROM pending_changes", [], |row| row.get(0))?;
        Ok(max)
    }

    fn pending_detections(
        &self,
        after_id: i64,
        max_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<PendingDetection>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, item_url, prior_snapshot, queued_at FROM pending_changes
             WHERE id > ?1 AND id <= ?2 ORDER BY id LIMIT ?3",
        )?;

        let pending = stmt
            .query_map(params![after_id, max_id, limit as i64], |row| {
                Ok(PendingDetection {
                    id: row.get(0)?,
                    item_url: row.get(1)?,
                    prior_snapshot: row.get(2)?,
                    queued_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pending)
    }

    fn commit_detection(
        &mut self,
        pending: &PendingDetection,
        diffed: &CatalogRecord,
        changes: &[Change],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        for change in changes {
            let prior = change.prior.as_ref().map(serde_json::to_string).transpose()?;
            let new = serde_json::to_string(&change.new)?;
            tx.execute(
                "INSERT INTO changes (item_url, kind, prior_value, new_value, detected_at, item_title, run_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    change.item_url,
                    change.kind.to_db_string(),
                    prior,
                    new,
                    change.detected_at.to_rfc3339(),
                    change.item_title,
                    change.run_id,
                ],
            )?;
        }

        tx.execute(
            "DELETE FROM pending_changes WHERE id = ?1",
            params![pending.id],
        )?;

        // A crawl may have overwritten the item after it was read for diffing
        let current: Option<String> = tx
            .query_row(
                "SELECT fingerprint FROM items WHERE url = ?1",
                params![pending.item_url],
                |row| row.get(0),
            )
            .optional()?;
        if matches!(current, Some(ref fp) if *fp != diffed.fingerprint) {
            enqueue_detection(&tx, &pending.item_url, Some(diffed))?;
        }

        tx.commit()?;
        Ok(())
    }

    fn discard_detection(&mut self, pending_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM pending_changes WHERE id = ?1",
            params![pending_id],
        )?;
        Ok(())
    }

    fn create_detection_run(&mut self) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO detection_runs (started_at, status) VALUES (?1, ?2)",
            params![
                Utc::now().to_rfc3339(),
                DetectionRunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_detection_run(&mut self, record: &DetectionRunRecord) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE detection_runs
             SET finished_at = ?1, items_scanned = ?2, changes_found = ?3, items_failed = ?4, status = ?5
             WHERE id = ?6",
            params![
                record.finished_at,
                record.items_scanned as i64,
                record.changes_found as i64,
                record.items_failed as i64,
                record.status.to_db_string(),
                record.id,
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::DetectionRunNotFound(record.id));
        }
        Ok(())
    }

    fn get_latest_detection_run(&self) -> StorageResult<Option<DetectionRunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, items_scanned, changes_found, items_failed, status
                 FROM detection_runs ORDER BY id DESC LIMIT 1",
                [],
                row_to_detection_run,
            )
            .optional()?;
        Ok(run)
    }

    fn list_changes(&self, query: &ChangeQuery) -> StorageResult<Vec<Change>> {
        let limit = query.effective_limit() as i64;
        let changes = match query.kind {
            Some(kind) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM changes WHERE kind = ?1 ORDER BY detected_at DESC, id DESC LIMIT ?2",
                    CHANGE_COLUMNS
                ))?;
                let rows = stmt.query_map(params![kind.to_db_string(), limit], row_to_change)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM changes ORDER BY detected_at DESC, id DESC LIMIT ?1",
                    CHANGE_COLUMNS
                ))?;
                let rows = stmt.query_map(params![limit], row_to_change)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(changes)
    }

    // ===== Statistics =====

    fn count_items(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_items_by_category(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT category, COUNT(*) FROM items GROUP BY category ORDER BY category")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    fn count_changes_by_kind(&self) -> StorageResult<HashMap<ChangeKind, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM changes GROUP BY kind")?;

        let mut summary = HashMap::new();
        let rows = stmt.query_map([], |row| {
            let kind_str: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((kind_str, count))
        })?;

        for row in rows {
            let (kind_str, count) = row?;
            if let Some(kind) = ChangeKind::from_db_string(&kind_str) {
                summary.insert(kind, count as u64);
            }
        }

        Ok(summary)
    }

    fn count_pending_detections(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM pending_changes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
