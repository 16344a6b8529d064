use crate::resilience::{BreakerSettings, RetryPolicy, TripPolicy};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for SiteLens
///
/// Every section is optional; missing keys fall back to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default, rename = "link-checker")]
    pub link_checker: LinkCheckerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Page fetcher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// User-Agent header sent with every page fetch
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Default request timeout when the analysis does not set one (milliseconds)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt for transient failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Shortest wait between retries (milliseconds)
    #[serde(rename = "retry-wait-time-ms")]
    pub retry_wait_time_ms: u64,

    /// Longest wait between retries (milliseconds)
    #[serde(rename = "max-retry-wait-time-ms")]
    pub max_retry_wait_time_ms: u64,

    /// Maximum redirects followed per fetch
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,

    /// Response body cap
    #[serde(rename = "max-response-size-bytes")]
    pub max_response_size_bytes: u64,

    /// Disables the private-network guard (local test servers only)
    #[serde(rename = "allow-private-networks")]
    pub allow_private_networks: bool,

    #[serde(rename = "circuit-breaker")]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("SiteLens/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: 30_000,
            max_retries: 3,
            retry_wait_time_ms: 1_000,
            max_retry_wait_time_ms: 5_000,
            max_redirects: 10,
            max_response_size_bytes: 10 * 1024 * 1024,
            allow_private_networks: false,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl FetcherConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_wait_time_ms),
            Duration::from_millis(self.max_retry_wait_time_ms),
        )
    }

    /// Breaker settings for page fetches: trips at ≥ 3 requests and ≥ 60% failures
    pub fn breaker_settings(&self) -> BreakerSettings {
        self.circuit_breaker.settings(
            "web-page-fetcher",
            TripPolicy {
                min_requests: 3,
                failure_ratio: 0.6,
            },
        )
    }
}

/// Link checker configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkCheckerConfig {
    /// User-Agent header sent with every probe
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-probe timeout (milliseconds)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Maximum number of probes in flight at once
    #[serde(rename = "max-concurrent-checks")]
    pub max_concurrent_checks: usize,

    /// Maximum number of external links probed per analysis
    #[serde(rename = "max-links-to-check")]
    pub max_links_to_check: usize,

    #[serde(rename = "retries")]
    pub retries: u32,

    #[serde(rename = "retry-wait-time-ms")]
    pub retry_wait_time_ms: u64,

    #[serde(rename = "max-retry-wait-time-ms")]
    pub max_retry_wait_time_ms: u64,

    /// Check links (and follow redirects) to private or local hosts
    #[serde(rename = "allow-private-networks")]
    pub allow_private_networks: bool,

    #[serde(rename = "circuit-breaker")]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for LinkCheckerConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("SiteLens-LinkChecker/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: 10_000,
            max_concurrent_checks: 10,
            max_links_to_check: 100,
            retries: 2,
            retry_wait_time_ms: 500,
            max_retry_wait_time_ms: 2_000,
            allow_private_networks: false,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl LinkCheckerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retries,
            Duration::from_millis(self.retry_wait_time_ms),
            Duration::from_millis(self.max_retry_wait_time_ms),
        )
    }

    /// Breaker settings for link probes: trips at ≥ 5 requests and ≥ 80% failures
    pub fn breaker_settings(&self) -> BreakerSettings {
        self.circuit_breaker.settings(
            "link-checker",
            TripPolicy {
                min_requests: 5,
                failure_ratio: 0.8,
            },
        )
    }
}

/// Circuit breaker tuning shared by both outbound collaborators
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Probe calls admitted while half-open
    #[serde(rename = "max-requests")]
    pub max_requests: u32,

    /// Rolling window for failure counters (milliseconds)
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,

    /// Cooldown before an open breaker goes half-open (milliseconds)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_requests: 3,
            interval_ms: 10_000,
            timeout_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn settings(&self, name: &str, trip: TripPolicy) -> BreakerSettings {
        BreakerSettings {
            name: name.to_string(),
            max_requests: self.max_requests,
            interval: Duration::from_millis(self.interval_ms),
            timeout: Duration::from_millis(self.timeout_ms),
            trip,
        }
    }
}

/// Snapshot cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of cached snapshots (seconds)
    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Durable store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "./sitelens.db".to_string(),
        }
    }
}
