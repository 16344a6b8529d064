//! Database schema definitions
//!
//! This module contains the SQL schema for the SiteLens database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per analysis request
CREATE TABLE IF NOT EXISTS analysis (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    completed_at TEXT,
    duration_ms INTEGER,
    results TEXT,
    error_code TEXT,
    error_message TEXT,
    error_status_code INTEGER,
    error_details TEXT
);

CREATE INDEX IF NOT EXISTS idx_analysis_status ON analysis(status);
CREATE INDEX IF NOT EXISTS idx_analysis_created_at ON analysis(created_at);
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
