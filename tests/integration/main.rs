//! Integration tests for SiteLens
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! fetcher, the link checker and the full analysis cycle end-to-end.

mod analysis_tests;
mod checker_tests;
mod fetcher_tests;
