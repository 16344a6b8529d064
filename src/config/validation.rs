use crate::config::types::{
    CacheConfig, CircuitBreakerConfig, Config, FetcherConfig, LinkCheckerConfig, StorageConfig,
};
use crate::ConfigError;

/// Longest breaker window or open timeout accepted (one day)
const MAX_BREAKER_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Longest cache entry lifetime accepted (thirty days)
const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_link_checker_config(&config.link_checker)?;
    validate_cache_config(&config.cache)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates page fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    validate_user_agent("fetcher.user-agent", &config.user_agent)?;

    if config.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "fetcher.timeout-ms must be >= 100ms, got {}ms",
            config.timeout_ms
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "fetcher.max-retries must be between 0 and 10, got {}",
            config.max_retries
        )));
    }

    validate_wait_window(
        "fetcher",
        config.retry_wait_time_ms,
        config.max_retry_wait_time_ms,
    )?;

    if config.max_redirects > 50 {
        return Err(ConfigError::Validation(format!(
            "fetcher.max-redirects must be between 0 and 50, got {}",
            config.max_redirects
        )));
    }

    if config.max_response_size_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "fetcher.max-response-size-bytes must be >= 1024, got {}",
            config.max_response_size_bytes
        )));
    }

    validate_breaker_config("fetcher.circuit-breaker", &config.circuit_breaker)?;

    Ok(())
}

/// Validates link checker configuration
fn validate_link_checker_config(config: &LinkCheckerConfig) -> Result<(), ConfigError> {
    validate_user_agent("link-checker.user-agent", &config.user_agent)?;

    if config.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "link-checker.timeout-ms must be >= 100ms, got {}ms",
            config.timeout_ms
        )));
    }

    if config.max_concurrent_checks < 1 || config.max_concurrent_checks > 100 {
        return Err(ConfigError::Validation(format!(
            "link-checker.max-concurrent-checks must be between 1 and 100, got {}",
            config.max_concurrent_checks
        )));
    }

    if config.max_links_to_check < 1 {
        return Err(ConfigError::Validation(format!(
            "link-checker.max-links-to-check must be >= 1, got {}",
            config.max_links_to_check
        )));
    }

    validate_wait_window(
        "link-checker",
        config.retry_wait_time_ms,
        config.max_retry_wait_time_ms,
    )?;

    validate_breaker_config("link-checker.circuit-breaker", &config.circuit_breaker)?;

    Ok(())
}

fn validate_breaker_config(section: &str, config: &CircuitBreakerConfig) -> Result<(), ConfigError> {
    if config.max_requests < 1 {
        return Err(ConfigError::Validation(format!(
            "{}.max-requests must be >= 1, got {}",
            section, config.max_requests
        )));
    }

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(format!(
            "{}.timeout-ms must be > 0",
            section
        )));
    }

    if config.timeout_ms > MAX_BREAKER_WINDOW_MS {
        return Err(ConfigError::Validation(format!(
            "{}.timeout-ms must be <= {}, got {}",
            section, MAX_BREAKER_WINDOW_MS, config.timeout_ms
        )));
    }

    if config.interval_ms > MAX_BREAKER_WINDOW_MS {
        return Err(ConfigError::Validation(format!(
            "{}.interval-ms must be <= {}, got {}",
            section, MAX_BREAKER_WINDOW_MS, config.interval_ms
        )));
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "cache.ttl-secs must be > 0".to_string(),
        ));
    }

    if config.ttl_secs > MAX_CACHE_TTL_SECS {
        return Err(ConfigError::Validation(format!(
            "cache.ttl-secs must be <= {}, got {}",
            MAX_CACHE_TTL_SECS, config.ttl_secs
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage.database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Retry waits must be ordered
fn validate_wait_window(section: &str, min_ms: u64, max_ms: u64) -> Result<(), ConfigError> {
    if min_ms > max_ms {
        return Err(ConfigError::Validation(format!(
            "{}.retry-wait-time-ms ({}) must not exceed max-retry-wait-time-ms ({})",
            section, min_ms, max_ms
        )));
    }

    Ok(())
}

/// User agents must be non-empty printable ASCII
fn validate_user_agent(key: &str, user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", key)));
    }

    if !user_agent.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        return Err(ConfigError::Validation(format!(
            "{} must contain only printable ASCII characters, got '{}'",
            key, user_agent
        )));
    }

    Ok(())
}
