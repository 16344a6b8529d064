//! Analysis orchestration
//!
//! `AnalysisService` drives an analysis through its lifecycle:
//! requested → in_progress → completed | failed.
//!
//! The durable store is authoritative and its errors propagate. The cache is
//! a fast path only: its failures are logged and swallowed.

use super::events::{stream_events, AnalysisEvent, StreamClose, StreamFrame};
use crate::analyzer::{DocumentAnalyzer, HtmlAnalyzer};
use crate::cache::{AnalysisCache, CacheRepository, MemoryStore};
use crate::checker::{ConcurrentLinkChecker, LinkChecker};
use crate::config::Config;
use crate::domain::{Analysis, AnalysisData, AnalysisOptions, AnalysisStatus};
use crate::fetcher::{PageFetcher, WebPageFetcher};
use crate::storage::{open_storage, AnalysisRepository};
use crate::url::parse_target;
use crate::{LensError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Coordinates the store, the cache and the analysis pipeline
pub struct AnalysisService {
    repository: Arc<dyn AnalysisRepository>,
    cache: Arc<dyn CacheRepository>,
    fetcher: Arc<dyn PageFetcher>,
    analyzer: Arc<dyn HtmlAnalyzer>,
    checker: Arc<dyn LinkChecker>,
}

impl AnalysisService {
    pub fn new(
        repository: Arc<dyn AnalysisRepository>,
        cache: Arc<dyn CacheRepository>,
        fetcher: Arc<dyn PageFetcher>,
        analyzer: Arc<dyn HtmlAnalyzer>,
        checker: Arc<dyn LinkChecker>,
    ) -> Self {
        Self {
            repository,
            cache,
            fetcher,
            analyzer,
            checker,
        }
    }

    /// Builds the production service from configuration
    ///
    /// Opens the SQLite database at `storage.database-path` and uses the
    /// in-process memory store for the cache.
    pub fn from_config(config: &Config) -> Result<Self> {
        let repository = open_storage(Path::new(&config.storage.database_path))?;
        let cache = AnalysisCache::new(Arc::new(MemoryStore::new()), config.cache.ttl());
        let fetcher = WebPageFetcher::new(&config.fetcher)?;
        let checker = ConcurrentLinkChecker::new(&config.link_checker)?;

        Ok(Self::new(
            Arc::new(repository),
            Arc::new(cache),
            Arc::new(fetcher),
            Arc::new(DocumentAnalyzer::new()),
            Arc::new(checker),
        ))
    }

    /// Records a new analysis in the `requested` state
    ///
    /// Only the durable write can fail the call.
    pub async fn start_analysis(&self, url: &str, options: &AnalysisOptions) -> Result<Analysis> {
        let target = parse_target(url).map_err(|e| LensError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let analysis = self.repository.save(target.as_str(), options)?;
        tracing::info!(analysis_id = %analysis.id, url = %analysis.url, "Analysis requested");

        self.write_cache(&analysis).await;

        Ok(analysis)
    }

    /// Loads an analysis, cache first
    ///
    /// On a miss (or a cache error) the durable store is read and the cache
    /// repopulated.
    pub async fn fetch_analysis(&self, id: &str) -> Result<Analysis> {
        let id = parse_id(id)?;

        match self.cache.find(id).await {
            Ok(Some(analysis)) => {
                tracing::debug!(analysis_id = %id, "Cache hit");
                return Ok(analysis);
            }
            Ok(None) => tracing::debug!(analysis_id = %id, "Cache miss"),
            Err(e) => tracing::warn!(analysis_id = %id, error = %e, "Cache read failed"),
        }

        let analysis = self.repository.find(id)?;
        self.write_cache(&analysis).await;

        Ok(analysis)
    }

    /// Returns a closed channel holding exactly one event for the current
    /// state of the analysis
    pub async fn fetch_analysis_events(&self, id: &str) -> Result<mpsc::Receiver<AnalysisEvent>> {
        let analysis = self.fetch_analysis(id).await?;

        let (tx, rx) = mpsc::channel(1);
        tx.send(AnalysisEvent::from(analysis))
            .await
            .map_err(|e| LensError::Internal(format!("event channel closed: {}", e)))?;

        Ok(rx)
    }

    /// Streams the events of one analysis into `sink`
    ///
    /// Lookup failures are delivered as an `Error` frame rather than
    /// returned.
    pub async fn stream_analysis(
        &self,
        id: &str,
        sink: mpsc::Sender<StreamFrame>,
        keepalive: Duration,
    ) -> StreamClose {
        match self.fetch_analysis_events(id).await {
            Ok(events) => stream_events(events, sink, keepalive).await,
            Err(e) => {
                let frame = StreamFrame::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                };
                if sink.send(frame).await.is_err() {
                    return StreamClose::Disconnected;
                }
                StreamClose::Exhausted
            }
        }
    }

    /// Runs the analysis pipeline for a requested analysis
    ///
    /// Fetch, analyze and (optionally) link checking happen in sequence.
    /// Pipeline errors are recorded on the analysis and the failed snapshot
    /// is returned; only store errors and invalid transitions are returned
    /// as `Err`.
    pub async fn execute_analysis(&self, id: &str, options: &AnalysisOptions) -> Result<Analysis> {
        let id = parse_id(id)?;
        let mut analysis = self.repository.find(id)?;

        if !analysis.mark_in_progress() {
            return Err(LensError::InvalidTransition {
                from: analysis.status,
                to: AnalysisStatus::InProgress,
            });
        }
        // A concurrent run that claimed the record first wins here
        self.repository.update(&analysis, AnalysisStatus::Requested)?;
        self.write_cache(&analysis).await;

        tracing::info!(analysis_id = %id, url = %analysis.url, "Analysis started");

        let started = Instant::now();
        let outcome = self.run_pipeline(&analysis.url, options).await;
        // Durations are persisted as whole milliseconds
        let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);

        let recorded = match outcome {
            Ok(results) => {
                tracing::info!(
                    analysis_id = %id,
                    duration_ms = elapsed.as_millis() as u64,
                    links = results.links.total_count,
                    inaccessible = results.links.inaccessible_links.len(),
                    "Analysis completed"
                );
                analysis.mark_completed(results, elapsed)
            }
            Err(e) => {
                tracing::warn!(
                    analysis_id = %id,
                    code = e.code(),
                    error = %e,
                    "Analysis failed"
                );
                analysis.mark_failed(e.to_analysis_error(), elapsed)
            }
        };

        if !recorded {
            return Err(LensError::Internal(format!(
                "analysis {} left in_progress unexpectedly",
                id
            )));
        }

        self.repository.update(&analysis, AnalysisStatus::InProgress)?;
        self.write_cache(&analysis).await;

        Ok(analysis)
    }

    /// Removes an analysis from the store, then from the cache
    pub async fn delete_analysis(&self, id: &str) -> Result<()> {
        let id = parse_id(id)?;
        self.repository.delete(id)?;

        if let Err(e) = self.cache.delete(id).await {
            tracing::error!(analysis_id = %id, error = %e, "Failed to evict analysis from cache");
        }

        tracing::info!(analysis_id = %id, "Analysis deleted");
        Ok(())
    }

    async fn run_pipeline(&self, url: &str, options: &AnalysisOptions) -> Result<AnalysisData> {
        let content = self.fetcher.fetch(url, options.timeout).await?;
        let page = self.analyzer.analyze(&content, options)?;

        let mut data = page.data;
        if options.check_links {
            data.links.inaccessible_links = self.checker.check_accessibility(&page.links).await;
        }

        Ok(data)
    }

    async fn write_cache(&self, analysis: &Analysis) {
        if let Err(e) = self.cache.set(analysis).await {
            tracing::error!(analysis_id = %analysis.id, error = %e, "Failed to cache analysis");
        }
    }
}

/// Malformed ids cannot name an analysis, so they read as not found
fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| LensError::AnalysisNotFound(raw.to_string()))
}
