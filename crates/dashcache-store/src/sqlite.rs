//! SQLite-backed range store.
//!
//! Ranges are stored as two integer columns; the overlap predicate and the
//! latest-end ordering run in SQL against the `(query, step_ns, range_end)`
//! index.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::schema::SCHEMA_SQL;
use crate::types::{CacheEntry, StoreStats};
use crate::RangeStore;
use dashcache_core::{Error, Result, TimeRange};

/// SQLite store for cached range responses.
pub struct SqliteRangeStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteRangeStore {
    /// Open or create the database file at `db_path`, creating parent
    /// directories as needed.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::Store(e.to_string()))?;
        }

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };

        let stats = store.stats()?;
        info!(
            "SqliteRangeStore initialized: {} entries, {} query keys, path={}",
            stats.total_entries, stats.distinct_queries, stats.location
        );

        Ok(store)
    }

    /// A private, non-persistent store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Database(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    fn step_nanos(step: Duration) -> Result<i64> {
        i64::try_from(step.as_nanos())
            .map_err(|_| Error::Store(format!("step {:?} does not fit the store", step)))
    }

    fn row_to_entry(query: &str, step: Duration, row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
        let body: Vec<u8> = row.get(2)?;
        Ok(CacheEntry {
            query: query.to_string(),
            step,
            range: TimeRange::new(row.get(0)?, row.get(1)?),
            body: Bytes::from(body),
        })
    }
}

impl RangeStore for SqliteRangeStore {
    fn insert(&self, query: &str, step: Duration, range: TimeRange, body: &[u8]) -> Result<()> {
        let step_ns = Self::step_nanos(step)?;
        let now = chrono::Utc::now().timestamp_millis();

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO query_cache (query, step_ns, range_start, range_end, body, inserted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![query, step_ns, range.start, range.end, body, now])
        .map_err(|e| Error::Store(e.to_string()))?;

        debug!("stored {} bytes for {:?} step={:?} range={}", body.len(), query, step, range);
        Ok(())
    }

    fn find_exact(
        &self,
        query: &str,
        step: Duration,
        requested: TimeRange,
    ) -> Result<Option<CacheEntry>> {
        let step_ns = Self::step_nanos(step)?;
        let conn = self.conn.lock();
        let entry = conn
            .prepare_cached(
                "SELECT range_start, range_end, body FROM query_cache
                 WHERE query = ?1 AND step_ns = ?2 AND range_start = ?3 AND range_end = ?4
                 ORDER BY id DESC LIMIT 1",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![query, step_ns, requested.start, requested.end], |row| {
                Self::row_to_entry(query, step, row)
            })
            .optional()
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(entry)
    }

    fn find_overlapping(
        &self,
        query: &str,
        step: Duration,
        requested: TimeRange,
    ) -> Result<Option<CacheEntry>> {
        if requested.is_empty() {
            return Ok(None);
        }
        let step_ns = Self::step_nanos(step)?;
        let conn = self.conn.lock();
        let entry = conn
            .prepare_cached(
                "SELECT range_start, range_end, body FROM query_cache
                 WHERE query = ?1 AND step_ns = ?2
                   AND range_start <= ?3
                   AND range_start < range_end
                   AND range_end > ?3
                   AND range_start < ?4
                   AND NOT (range_start = ?3 AND range_end = ?4)
                 ORDER BY range_end DESC, id DESC
                 LIMIT 1",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![query, step_ns, requested.start, requested.end], |row| {
                Self::row_to_entry(query, step, row)
            })
            .optional()
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(entry)
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let (total_entries, distinct_queries, body_bytes): (i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*),
                        (SELECT COUNT(*) FROM (SELECT DISTINCT query, step_ns FROM query_cache)),
                        COALESCE(SUM(LENGTH(body)), 0)
                 FROM query_cache",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(StoreStats {
            total_entries,
            distinct_queries,
            body_bytes,
            location: self
                .db_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string()),
        })
    }
}
