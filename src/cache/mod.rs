//! Snapshot cache for analyses
//!
//! The cache is never authoritative. Callers treat every failure here as
//! non-fatal and fall back to the durable store.

mod repository;
mod store;

pub use repository::{analysis_key, result_key, AnalysisCache, CacheRepository};
pub use store::{KeyValueStore, MemoryStore};
