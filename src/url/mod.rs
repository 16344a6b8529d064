//! URL handling module for SiteLens
//!
//! This module provides the outbound-request guard (scheme, host and
//! private-network checks) and the host comparison used to classify links.

mod guard;

use crate::{UrlError, UrlResult};
use ::url::Url;

// Re-export main functions
pub use guard::{check_resolved_host, is_blocked_ip, is_private_or_local_host};

/// Validates a URL as a target for outbound requests
///
/// Rejects empty input, unparseable URLs, schemes other than http/https,
/// URLs without a host, and hosts naming loopback, private, unspecified or
/// link-local targets.
///
/// # Arguments
///
/// * `raw` - The URL string as submitted
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlError)` - The first rule the URL violates
///
/// # Examples
///
/// ```
/// use sitelens::url::validate_url;
///
/// assert!(validate_url("https://example.com").is_ok());
/// assert!(validate_url("http://127.0.0.1/x").is_err());
/// assert!(validate_url("ftp://example.com").is_err());
/// ```
pub fn validate_url(raw: &str) -> UrlResult<Url> {
    let url = parse_target(raw)?;

    if is_private_or_local_host(&url) {
        return Err(UrlError::PrivateNetwork(
            url.host_str().unwrap_or_default().to_string(),
        ));
    }

    Ok(url)
}

/// Same as [`validate_url`] without the private-network rule
///
/// Used when the deployment explicitly allows local targets.
pub fn parse_target(raw: &str) -> UrlResult<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Empty);
    }

    let url = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(other.to_string())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingHost),
    }
}

/// Returns true if both URLs share host and effective port
///
/// Hosts are compared case-insensitively; a missing port counts as the
/// scheme's default.
pub fn same_authority(a: &Url, b: &Url) -> bool {
    let host_a = a.host_str().map(|h| h.to_lowercase());
    let host_b = b.host_str().map(|h| h.to_lowercase());

    host_a.is_some() && host_a == host_b && a.port_or_known_default() == b.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_public_urls() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://example.com:8080/path?q=1").is_ok());
        assert!(validate_url("  https://example.com/  ").is_ok());
    }

    #[test]
    fn test_validate_rejects_private_targets() {
        for target in [
            "http://127.0.0.1/x",
            "http://localhost",
            "http://192.168.1.1",
            "http://10.0.0.8/",
            "http://172.20.1.1/",
            "http://0.0.0.0/",
            "http://[::1]/",
            "http://[fd12::1]/",
        ] {
            assert!(
                matches!(validate_url(target), Err(UrlError::PrivateNetwork(_))),
                "{} should be rejected",
                target
            );
        }
    }

    #[test]
    fn test_validate_rejects_malformed_input() {
        assert_eq!(validate_url(""), Err(UrlError::Empty));
        assert_eq!(validate_url("   "), Err(UrlError::Empty));
        assert!(matches!(validate_url("not a url"), Err(UrlError::Parse(_))));
        assert_eq!(
            validate_url("ftp://example.com/file"),
            Err(UrlError::InvalidScheme("ftp".to_string()))
        );
        assert!(matches!(
            validate_url("javascript:alert(1)"),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_parse_target_allows_local() {
        assert!(parse_target("http://127.0.0.1:3000/").is_ok());
        assert!(parse_target("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_same_authority() {
        let base = Url::parse("https://example.com/page").unwrap();

        assert!(same_authority(
            &base,
            &Url::parse("https://EXAMPLE.com/other").unwrap()
        ));
        assert!(same_authority(
            &base,
            &Url::parse("https://example.com:443/").unwrap()
        ));
        assert!(!same_authority(
            &base,
            &Url::parse("https://example.com:8443/").unwrap()
        ));
        assert!(!same_authority(
            &base,
            &Url::parse("https://www.example.com/").unwrap()
        ));
    }
}
