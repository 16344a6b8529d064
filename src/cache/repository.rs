use super::store::KeyValueStore;
use crate::domain::{Analysis, AnalysisOptions};
use crate::{LensError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const ANALYSIS_PREFIX: &str = "sitelens:analysis:";
const RESULT_PREFIX: &str = "sitelens:result:";

/// Key under which an analysis snapshot is cached
pub fn analysis_key(id: Uuid) -> String {
    format!("{}{}", ANALYSIS_PREFIX, id)
}

/// Content key for a (url, options) pair
///
/// Identical requests map to the same key. No read path consults it yet.
pub fn result_key(url: &str, options: &AnalysisOptions) -> String {
    let material = format!(
        "{}:{}:{}:{}:{}",
        url,
        options.include_headings,
        options.check_links,
        options.detect_forms,
        options.timeout.as_millis()
    );
    let digest = Sha256::digest(material.as_bytes());
    format!("{}{}", RESULT_PREFIX, hex::encode(digest))
}

/// Non-authoritative snapshot cache for analyses
///
/// `find` returns `Ok(None)` on a miss and `CacheUnavailable` when the
/// backing store cannot be reached.
#[async_trait]
pub trait CacheRepository: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Analysis>>;

    async fn set(&self, analysis: &Analysis) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// JSON snapshots of analyses over a `KeyValueStore`
pub struct AnalysisCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl AnalysisCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }
}

#[async_trait]
impl CacheRepository for AnalysisCache {
    async fn find(&self, id: Uuid) -> Result<Option<Analysis>> {
        let Some(bytes) = self.store.get(&analysis_key(id)).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| LensError::CacheUnavailable(format!("corrupt snapshot for {}: {}", id, e)))
    }

    async fn set(&self, analysis: &Analysis) -> Result<()> {
        let bytes = serde_json::to_vec(analysis)?;
        self.store
            .set(&analysis_key(analysis.id), bytes, self.ttl)
            .await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.store.delete(&analysis_key(id)).await
    }
}
