//! SiteLens: a resilient web page analyzer
//!
//! This crate fetches a remote web page, extracts structural facts from its HTML,
//! probes the external links it discovers, and persists the resulting analysis
//! behind a cache-aside read path with a progress-event feed.

pub mod analyzer;
pub mod cache;
pub mod checker;
pub mod config;
pub mod domain;
pub mod fetcher;
pub mod resilience;
pub mod service;
pub mod storage;
pub mod url;

use domain::{AnalysisError, AnalysisStatus};
use std::collections::BTreeMap;
use thiserror::Error;

/// Main error type for SiteLens operations
///
/// Every variant maps onto a machine-readable code, an HTTP-style status and a
/// details map so boundary layers can render structured error payloads.
#[derive(Debug, Error)]
pub enum LensError {
    #[error("Invalid URL: {url} ({reason})")]
    InvalidUrl { url: String, reason: String },

    #[error("URL {url} is not reachable: {reason}")]
    UrlNotReachable {
        url: String,
        status_code: u16,
        reason: String,
    },

    #[error("Service temporarily unavailable due to repeated failures ({breaker})")]
    CircuitBreakerOpen { breaker: String },

    #[error("Response size {size} bytes exceeds maximum allowed {limit} bytes")]
    ResponseTooLarge { url: String, size: u64, limit: u64 },

    #[error("Analysis not found: {0}")]
    AnalysisNotFound(String),

    #[error("Cache service unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: AnalysisStatus,
        to: AnalysisStatus,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl LensError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "INVALID_URL",
            Self::UrlNotReachable { .. } => "URL_NOT_REACHABLE",
            Self::CircuitBreakerOpen { .. } => "CIRCUIT_BREAKER_OPEN",
            Self::ResponseTooLarge { .. } => "RESPONSE_TOO_LARGE",
            Self::AnalysisNotFound(_) => "ANALYSIS_NOT_FOUND",
            Self::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            Self::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::Config(_)
            | Self::Storage(_)
            | Self::Serialization(_)
            | Self::Reqwest(_)
            | Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// HTTP-style status code associated with the error
    ///
    /// `UrlNotReachable` reports the upstream status when one was observed and
    /// 502 for network-level failures.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidUrl { .. } => 400,
            Self::UrlNotReachable { status_code, .. } => {
                if *status_code == 0 {
                    502
                } else {
                    *status_code
                }
            }
            Self::CircuitBreakerOpen { .. } | Self::CacheUnavailable(_) => 503,
            Self::ResponseTooLarge { .. } => 413,
            Self::AnalysisNotFound(_) => 404,
            Self::InvalidTransition { .. } => 409,
            _ => 500,
        }
    }

    /// Structured details attached to the error
    pub fn details(&self) -> BTreeMap<String, serde_json::Value> {
        let mut details = BTreeMap::new();
        match self {
            Self::InvalidUrl { url, reason } => {
                details.insert("url".to_string(), url.clone().into());
                details.insert("reason".to_string(), reason.clone().into());
            }
            Self::UrlNotReachable {
                url, status_code, ..
            } => {
                details.insert("url".to_string(), url.clone().into());
                details.insert("status_code".to_string(), (*status_code).into());
            }
            Self::CircuitBreakerOpen { breaker } => {
                details.insert("breaker".to_string(), breaker.clone().into());
            }
            Self::ResponseTooLarge { url, size, limit } => {
                details.insert("url".to_string(), url.clone().into());
                details.insert("size_bytes".to_string(), (*size).into());
                details.insert("max_size_bytes".to_string(), (*limit).into());
            }
            Self::AnalysisNotFound(id) => {
                details.insert("analysis_id".to_string(), id.clone().into());
            }
            Self::InvalidTransition { from, to } => {
                details.insert("from".to_string(), from.to_db_string().into());
                details.insert("to".to_string(), to.to_db_string().into());
            }
            _ => {}
        }
        details
    }

    /// Converts the error into the form persisted on a failed analysis
    pub fn to_analysis_error(&self) -> AnalysisError {
        let details = self.details();
        AnalysisError {
            code: self.code().to_string(),
            message: self.to_string(),
            status_code: Some(self.status_code()),
            details: if details.is_empty() {
                None
            } else {
                serde_json::to_string(&details).ok()
            },
        }
    }

    /// Returns true for errors that only mean "the record does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AnalysisNotFound(_))
    }
}

impl From<storage::StorageError> for LensError {
    fn from(err: storage::StorageError) -> Self {
        match err {
            storage::StorageError::AnalysisNotFound(id) => Self::AnalysisNotFound(id),
            storage::StorageError::StatusConflict { found, to, .. } => {
                Self::InvalidTransition { from: found, to }
            }
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("URL cannot be empty")]
    Empty,

    #[error("Invalid URL format: {0}")]
    Parse(String),

    #[error("URL scheme must be http or https, got: {0}")]
    InvalidScheme(String),

    #[error("URL must include a host")]
    MissingHost,

    #[error("Access to private or local networks is not allowed: {0}")]
    PrivateNetwork(String),
}

/// Result type alias for SiteLens operations
pub type Result<T> = std::result::Result<T, LensError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use domain::{Analysis, AnalysisData, AnalysisOptions};
pub use service::AnalysisService;
pub use crate::url::validate_url;
