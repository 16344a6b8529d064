//! Link accessibility checker
//!
//! This module probes the external links found on a page:
//! - Filters to external links, deduplicates, and caps the count
//! - Skips private and local hosts unless the configuration allows them
//! - Spawns one task per link, bounded by a semaphore of probe slots
//! - Sends HEAD, falling back to GET when HEAD fails at the transport level
//! - Guards every probe with the `link-checker` circuit breaker
//!
//! The call returns once every spawned probe has finished. Dropping the
//! in-flight call aborts the outstanding probes.

mod probe;

use crate::config::LinkCheckerConfig;
use crate::domain::{InaccessibleLink, Link};
use crate::resilience::{BreakerError, CircuitBreaker};
use crate::url::is_private_or_local_host;
use crate::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

pub use probe::{HttpLinkProbe, LinkProbe, ProbeError};

const BREAKER_OPEN_MESSAGE: &str = "Service temporarily unavailable (circuit breaker open)";

/// Checks which links are inaccessible
#[async_trait]
pub trait LinkChecker: Send + Sync {
    /// Returns one entry per inaccessible external link, in completion order
    async fn check_accessibility(&self, links: &[Link]) -> Vec<InaccessibleLink>;
}

/// Link checker with bounded parallelism
pub struct ConcurrentLinkChecker {
    probe: Arc<dyn LinkProbe>,
    breaker: Arc<CircuitBreaker>,
    max_concurrent_checks: usize,
    max_links_to_check: usize,
    allow_private_networks: bool,
}

impl ConcurrentLinkChecker {
    /// Creates a checker that probes over HTTP
    pub fn new(config: &LinkCheckerConfig) -> Result<Self> {
        let probe = HttpLinkProbe::new(config)?;
        Ok(Self::with_probe(Arc::new(probe), config))
    }

    /// Creates a checker over a custom probe transport
    pub fn with_probe(probe: Arc<dyn LinkProbe>, config: &LinkCheckerConfig) -> Self {
        Self {
            probe,
            breaker: Arc::new(CircuitBreaker::new(config.breaker_settings())),
            max_concurrent_checks: config.max_concurrent_checks.max(1),
            max_links_to_check: config.max_links_to_check,
            allow_private_networks: config.allow_private_networks,
        }
    }

    /// The breaker guarding this checker
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// External, unique, parseable URLs, capped at the configured maximum
    ///
    /// Links naming a private or local host are dropped unless allowed.
    fn select_targets(&self, links: &[Link]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        let mut skipped_private = 0;

        for link in links.iter().filter(|link| link.is_external()) {
            if !seen.insert(link.url.as_str()) {
                continue;
            }
            let Ok(url) = Url::parse(&link.url) else {
                continue;
            };
            if !self.allow_private_networks && is_private_or_local_host(&url) {
                skipped_private += 1;
                continue;
            }
            targets.push(link.url.clone());
        }

        if skipped_private > 0 {
            tracing::debug!(skipped_private, "Skipped links to private or local hosts");
        }

        if targets.len() > self.max_links_to_check {
            tracing::warn!(
                total_links = targets.len(),
                max_links = self.max_links_to_check,
                "Too many links to check, limiting to maximum allowed"
            );
            targets.truncate(self.max_links_to_check);
        }

        targets
    }
}

#[async_trait]
impl LinkChecker for ConcurrentLinkChecker {
    async fn check_accessibility(&self, links: &[Link]) -> Vec<InaccessibleLink> {
        if links.is_empty() {
            return Vec::new();
        }

        let targets = self.select_targets(links);
        tracing::info!(
            total_links = links.len(),
            links_to_check = targets.len(),
            "Starting link accessibility check"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_checks));
        let results = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = JoinSet::new();

        for url in targets.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let results = Arc::clone(&results);
            let probe = Arc::clone(&self.probe);
            let breaker = Arc::clone(&self.breaker);

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };

                if let Some(entry) = check_single_link(probe.as_ref(), &breaker, url).await {
                    results
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(entry);
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Link probe task failed");
            }
        }

        let inaccessible = std::mem::take(&mut *results.lock().unwrap_or_else(|e| e.into_inner()));

        tracing::info!(
            total_checked = targets.len(),
            inaccessible = inaccessible.len(),
            "Link accessibility check completed"
        );

        inaccessible
    }
}

/// Probes one link inside the breaker and maps the outcome
async fn check_single_link(
    probe: &dyn LinkProbe,
    breaker: &CircuitBreaker,
    url: String,
) -> Option<InaccessibleLink> {
    let target = url.as_str();
    let outcome = breaker
        .execute(|| async move {
            match probe.head(target).await {
                Ok(status) => Ok(status),
                Err(_) => probe.get(target).await,
            }
        })
        .await;

    match outcome {
        Ok(status) if status >= 400 => {
            tracing::debug!(url = %url, status_code = status, "Link is inaccessible");
            Some(InaccessibleLink {
                url,
                status_code: status,
                error: status_text(status),
            })
        }
        Ok(_) => None,
        Err(BreakerError::Inner(e)) => {
            tracing::debug!(url = %url, error = %e, "Link check failed");
            Some(InaccessibleLink {
                url,
                status_code: 0,
                error: e.to_string(),
            })
        }
        Err(_) => Some(InaccessibleLink {
            url,
            status_code: 503,
            error: BREAKER_OPEN_MESSAGE.to_string(),
        }),
    }
}

/// Status line text, e.g. "404 Not Found"
fn status_text(status: u16) -> String {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason());

    match reason {
        Some(reason) => format!("{} {}", status, reason),
        None => status.to_string(),
    }
}
