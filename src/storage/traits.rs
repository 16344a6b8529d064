//! Storage traits and error types
//!
//! This module defines the durable-store contract for analysis records and
//! its error type.

use crate::domain::{Analysis, AnalysisOptions, AnalysisStatus};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Analysis not found: {0}")]
    AnalysisNotFound(String),

    /// The record exists but was not in the expected status
    #[error("Analysis {id} is {}, cannot move to {}", .found.to_db_string(), .to.to_db_string())]
    StatusConflict {
        id: String,
        found: AnalysisStatus,
        to: AnalysisStatus,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable store for analysis records
///
/// This is the authoritative copy of every analysis. Each operation is a
/// single statement against one record; no transaction spans records.
/// Implementations must be safe to share between tasks.
pub trait AnalysisRepository: Send + Sync {
    /// Loads an analysis by id
    ///
    /// Returns `StorageError::AnalysisNotFound` if no record has this id.
    fn find(&self, id: Uuid) -> StorageResult<Analysis>;

    /// Persists a new analysis in the `requested` state
    ///
    /// The id and creation timestamp are assigned by the store.
    fn save(&self, url: &str, options: &AnalysisOptions) -> StorageResult<Analysis>;

    /// Rewrites the mutable fields of an existing record
    ///
    /// The record is addressed by `analysis.id` and only written while its
    /// stored status is still `expected`. Status, completion time, duration,
    /// results and error fields are replaced. A record in any other status is
    /// left untouched and reported as `StorageError::StatusConflict`.
    fn update(&self, analysis: &Analysis, expected: AnalysisStatus) -> StorageResult<()>;

    /// Removes an analysis
    fn delete(&self, id: Uuid) -> StorageResult<()>;
}
