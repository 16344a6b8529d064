//! Configuration module for SiteLens
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section and key is optional and falls back to a default.
//!
//! # Example
//!
//! ```no_run
//! use sitelens::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitelens.toml")).unwrap();
//! println!("Probing at most {} links", config.link_checker.max_links_to_check);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheConfig, CircuitBreakerConfig, Config, FetcherConfig, LinkCheckerConfig, StorageConfig,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
