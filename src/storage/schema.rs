//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the Shelfwatch database.
//! Prices are stored as integer minor units; timestamps as RFC 3339 text.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Catalog items, keyed by canonical URL
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT,
    price_excl_tax INTEGER NOT NULL,
    price_incl_tax INTEGER NOT NULL,
    availability TEXT NOT NULL,
    num_reviews INTEGER NOT NULL DEFAULT 0,
    rating INTEGER NOT NULL,
    image_url TEXT,
    last_crawled TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    raw_html TEXT
);

CREATE INDEX IF NOT EXISTS idx_items_category ON items(category);
CREATE INDEX IF NOT EXISTS idx_items_price ON items(price_incl_tax);
CREATE INDEX IF NOT EXISTS idx_items_rating ON items(rating);
CREATE INDEX IF NOT EXISTS idx_items_last_crawled ON items(last_crawled);
CREATE INDEX IF NOT EXISTS idx_items_fingerprint ON items(fingerprint);

-- Append-only change log
CREATE TABLE IF NOT EXISTS changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_url TEXT NOT NULL,
    kind TEXT NOT NULL,
    prior_value TEXT,
    new_value TEXT NOT NULL,
    detected_at TEXT NOT NULL,
    item_title TEXT NOT NULL,
    run_id INTEGER NOT NULL REFERENCES detection_runs(id),
    UNIQUE(item_url, kind, run_id)
);

CREATE INDEX IF NOT EXISTS idx_changes_item ON changes(item_url);
CREATE INDEX IF NOT EXISTS idx_changes_detected ON changes(detected_at);

-- Items touched by a crawl and not yet diffed; prior_snapshot is NULL for new items
CREATE TABLE IF NOT EXISTS pending_changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_url TEXT NOT NULL UNIQUE,
    prior_snapshot TEXT,
    queued_at TEXT NOT NULL
);

-- Track detection passes
CREATE TABLE IF NOT EXISTS detection_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    items_scanned INTEGER NOT NULL DEFAULT 0,
    changes_found INTEGER NOT NULL DEFAULT 0,
    items_failed INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL
);

-- Singleton crawl checkpoint
CREATE TABLE IF NOT EXISTS crawl_state (
    state_type TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    cursor_category TEXT,
    cursor_page INTEGER,
    cursor_page_url TEXT,
    last_item_url TEXT,
    total_processed INTEGER NOT NULL DEFAULT 0,
    pages_processed INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0,
    items_new INTEGER NOT NULL DEFAULT 0,
    items_updated INTEGER NOT NULL DEFAULT 0,
    items_unchanged INTEGER NOT NULL DEFAULT 0,
    fetch_failures INTEGER NOT NULL DEFAULT 0,
    parse_failures INTEGER NOT NULL DEFAULT 0,
    store_failures INTEGER NOT NULL DEFAULT 0,
    started_at TEXT,
    updated_at TEXT NOT NULL,
    last_error TEXT
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
