//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the
//! AnalysisRepository trait.

use crate::domain::{Analysis, AnalysisData, AnalysisError, AnalysisOptions, AnalysisStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{AnalysisRepository, StorageError, StorageResult};
use crate::LensError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

const SELECT_ANALYSIS: &str = "SELECT id, url, status, created_at, completed_at, duration_ms, results,
        error_code, error_message, error_status_code, error_details
 FROM analysis WHERE id = ?1";

/// SQLite storage backend
///
/// The connection sits behind a mutex so the repository can be shared
/// between tasks. Every operation is one short statement.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Creates a new SqliteRepository instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteRepository)` - Successfully opened/created database
    /// * `Err(LensError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, LensError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        tracing::info!(path = %path.display(), "Opened analysis database");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, LensError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Raw column values of one analysis row
struct AnalysisRow {
    id: String,
    url: String,
    status: String,
    created_at: String,
    completed_at: Option<String>,
    duration_ms: Option<i64>,
    results: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
    error_status_code: Option<i64>,
    error_details: Option<String>,
}

impl AnalysisRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            status: row.get(2)?,
            created_at: row.get(3)?,
            completed_at: row.get(4)?,
            duration_ms: row.get(5)?,
            results: row.get(6)?,
            error_code: row.get(7)?,
            error_message: row.get(8)?,
            error_status_code: row.get(9)?,
            error_details: row.get(10)?,
        })
    }

    fn into_analysis(self) -> StorageResult<Analysis> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StorageError::Serialization(format!("bad id {:?}: {}", self.id, e)))?;

        let status = AnalysisStatus::from_db_string(&self.status)
            .ok_or_else(|| StorageError::Serialization(format!("bad status {:?}", self.status)))?;

        let results = self
            .results
            .map(|json| serde_json::from_str::<AnalysisData>(&json))
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let error = self.error_code.map(|code| AnalysisError {
            code,
            message: self.error_message.unwrap_or_default(),
            status_code: self.error_status_code.and_then(|c| u16::try_from(c).ok()),
            details: self.error_details,
        });

        Ok(Analysis {
            id,
            url: self.url,
            status,
            created_at: parse_timestamp(&self.created_at)?,
            completed_at: self.completed_at.as_deref().map(parse_timestamp).transpose()?,
            duration: self
                .duration_ms
                .map(|ms| Duration::from_millis(u64::try_from(ms).unwrap_or(0))),
            results,
            error,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("bad timestamp {:?}: {}", raw, e)))
}

impl AnalysisRepository for SqliteRepository {
    fn find(&self, id: Uuid) -> StorageResult<Analysis> {
        let row = {
            let conn = self.conn();
            let mut stmt = conn.prepare(SELECT_ANALYSIS)?;
            let row = stmt
                .query_row(params![id.to_string()], AnalysisRow::from_row)
                .optional()?;
            row
        };

        match row {
            Some(row) => row.into_analysis(),
            None => Err(StorageError::AnalysisNotFound(id.to_string())),
        }
    }

    fn save(&self, url: &str, options: &AnalysisOptions) -> StorageResult<Analysis> {
        let analysis = Analysis::new(url);

        self.conn().execute(
            "INSERT INTO analysis (id, url, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                analysis.id.to_string(),
                analysis.url,
                analysis.status.to_db_string(),
                format_timestamp(&analysis.created_at),
            ],
        )?;

        tracing::debug!(id = %analysis.id, url = %url, ?options, "Saved analysis");

        Ok(analysis)
    }

    fn update(&self, analysis: &Analysis, expected: AnalysisStatus) -> StorageResult<()> {
        let results = analysis
            .results
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let error = analysis.error.as_ref();

        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE analysis
             SET status = ?1, completed_at = ?2, duration_ms = ?3, results = ?4,
                 error_code = ?5, error_message = ?6, error_status_code = ?7, error_details = ?8
             WHERE id = ?9 AND status = ?10",
            params![
                analysis.status.to_db_string(),
                analysis.completed_at.as_ref().map(format_timestamp),
                analysis.duration.map(|d| d.as_millis() as i64),
                results,
                error.map(|e| e.code.as_str()),
                error.map(|e| e.message.as_str()),
                error.and_then(|e| e.status_code),
                error.and_then(|e| e.details.as_deref()),
                analysis.id.to_string(),
                expected.to_db_string(),
            ],
        )?;

        if changed > 0 {
            return Ok(());
        }

        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM analysis WHERE id = ?1",
                params![analysis.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match current {
            None => Err(StorageError::AnalysisNotFound(analysis.id.to_string())),
            Some(raw) => {
                let found = AnalysisStatus::from_db_string(&raw)
                    .ok_or_else(|| StorageError::Serialization(format!("bad status {:?}", raw)))?;
                tracing::warn!(
                    id = %analysis.id,
                    expected = expected.to_db_string(),
                    found = found.to_db_string(),
                    "Refused update of analysis in unexpected status"
                );
                Err(StorageError::StatusConflict {
                    id: analysis.id.to_string(),
                    found,
                    to: analysis.status,
                })
            }
        }
    }

    fn delete(&self, id: Uuid) -> StorageResult<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM analysis WHERE id = ?1", params![id.to_string()])?;

        if changed == 0 {
            return Err(StorageError::AnalysisNotFound(id.to_string()));
        }

        Ok(())
    }
}
