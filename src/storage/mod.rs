//! Storage module for persisting analyses
//!
//! This module holds the authoritative copy of every analysis record:
//! - SQLite database initialization and schema management
//! - Find/save/update/delete of single records

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteRepository;
pub use traits::{AnalysisRepository, StorageError, StorageResult};

use crate::LensError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteRepository)` - Successfully initialized storage
/// * `Err(LensError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteRepository, LensError> {
    SqliteRepository::new(path)
}
