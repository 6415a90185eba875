//! Database schema SQL.

/// One row per cached response. Duplicate ranges are allowed.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS query_cache (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    step_ns INTEGER NOT NULL,
    range_start INTEGER NOT NULL,
    range_end INTEGER NOT NULL,
    body BLOB NOT NULL,
    inserted_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_query_cache_lookup
    ON query_cache(query, step_ns, range_end);
"#;
