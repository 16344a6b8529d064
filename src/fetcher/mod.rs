//! Resilient page fetcher
//!
//! This module handles outbound page fetches, including:
//! - Validating the target against the private-network guard
//! - Building the HTTP client with the configured user agent and headers
//! - Retrying transient failures with bounded exponential backoff
//! - Guarding every fetch with the `web-page-fetcher` circuit breaker
//! - Capping the response body while it streams

use crate::config::FetcherConfig;
use crate::domain::WebPageContent;
use crate::resilience::{BreakerError, CircuitBreaker, RetryPolicy};
use crate::url::{check_resolved_host, is_private_or_local_host, parse_target, validate_url};
use crate::{LensError, Result, UrlError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, Response};
use std::collections::HashMap;
use std::error::Error as _;
use std::time::{Duration, Instant};
use url::Url;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.5";

/// Fetches a page for analysis
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`, giving up after `timeout`
    ///
    /// A zero timeout means "use the fetcher's configured default".
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<WebPageContent>;
}

/// Why a redirect hop was not followed
#[derive(Debug, thiserror::Error)]
pub enum RedirectError {
    #[error("stopped after {0} redirects")]
    TooMany(usize),

    #[error("redirect refused: {0}")]
    Refused(#[from] UrlError),
}

/// Decides whether a redirect to `next` may be followed
///
/// `visited` counts the URLs already requested, the original one included.
/// Hops must stay on http(s), and unless `allow_private` is set they may
/// not name a private or local host. Only the literal host is checked here;
/// redirect hops are not resolved.
pub fn check_redirect(
    next: &Url,
    visited: usize,
    max_redirects: usize,
    allow_private: bool,
) -> std::result::Result<(), RedirectError> {
    if visited > max_redirects {
        return Err(RedirectError::TooMany(max_redirects));
    }

    match next.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(other.to_string()).into()),
    }

    if !allow_private && is_private_or_local_host(next) {
        return Err(UrlError::PrivateNetwork(next.to_string()).into());
    }

    Ok(())
}

/// Builds the HTTP client used for page fetches
///
/// # Arguments
///
/// * `user_agent` - Value of the User-Agent header
/// * `max_redirects` - Redirects followed before the request fails
/// * `allow_private` - Whether redirects may lead to private or local hosts
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sitelens::fetcher::build_http_client;
///
/// let client = build_http_client("SiteLens/1.0", 10, false).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &str,
    max_redirects: usize,
    allow_private: bool,
) -> reqwest::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::custom(move |attempt| {
            let verdict = check_redirect(
                attempt.url(),
                attempt.previous().len(),
                max_redirects,
                allow_private,
            );
            match verdict {
                Ok(()) => attempt.follow(),
                Err(e) => attempt.error(e),
            }
        }))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Page fetcher over reqwest
pub struct WebPageFetcher {
    client: Client,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    default_timeout: Duration,
    max_response_size: u64,
    allow_private_networks: bool,
}

impl WebPageFetcher {
    /// Creates a fetcher from configuration
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = build_http_client(
            &config.user_agent,
            config.max_redirects,
            config.allow_private_networks,
        )?;

        Ok(Self {
            client,
            breaker: CircuitBreaker::new(config.breaker_settings()),
            retry: config.retry_policy(),
            default_timeout: Duration::from_millis(config.timeout_ms),
            max_response_size: config.max_response_size_bytes,
            allow_private_networks: config.allow_private_networks,
        })
    }

    /// The breaker guarding this fetcher
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Applies the URL guard, including the resolved-address check
    async fn validate_target(&self, raw: &str) -> Result<Url> {
        let invalid = |e: UrlError| LensError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        };

        if self.allow_private_networks {
            return parse_target(raw).map_err(invalid);
        }

        let url = validate_url(raw).map_err(invalid)?;
        check_resolved_host(&url).await.map_err(invalid)?;
        Ok(url)
    }

    /// GET with retries on connect/timeout errors, 429 and 5xx
    async fn fetch_with_retry(&self, url: &Url, timeout: Duration) -> Result<WebPageContent> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let started = Instant::now();

            match self.client.get(url.clone()).timeout(timeout).send().await {
                Err(e) => {
                    if attempt < max_attempts && RetryPolicy::is_retryable_error(&e) {
                        let wait = self.retry.backoff(attempt - 1);
                        tracing::warn!(
                            url = %url,
                            attempt,
                            error = %e,
                            wait_ms = wait.as_millis() as u64,
                            "Fetch failed, retrying"
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    if let Some(RedirectError::Refused(reason)) =
                        e.source().and_then(|s| s.downcast_ref::<RedirectError>())
                    {
                        tracing::warn!(url = %url, reason = %reason, "Redirect refused");
                        return Err(LensError::InvalidUrl {
                            url: url.to_string(),
                            reason: reason.to_string(),
                        });
                    }

                    tracing::error!(url = %url, error = %e, "Failed to fetch URL");
                    return Err(LensError::UrlNotReachable {
                        url: url.to_string(),
                        status_code: 0,
                        reason: e.to_string(),
                    });
                }
                Ok(response) => {
                    let status = response.status().as_u16();

                    if attempt < max_attempts && RetryPolicy::is_retryable_status(status) {
                        let wait = self.retry.backoff(attempt - 1);
                        tracing::warn!(
                            url = %url,
                            attempt,
                            status_code = status,
                            wait_ms = wait.as_millis() as u64,
                            "Transient HTTP status, retrying"
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    return self.read_page(url, response, started).await;
                }
            }
        }
    }

    /// Turns a final response into page content
    async fn read_page(
        &self,
        requested: &Url,
        response: Response,
        started: Instant,
    ) -> Result<WebPageContent> {
        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            tracing::warn!(
                url = %requested,
                status_code = status.as_u16(),
                "HTTP request returned non-success status code"
            );
            return Err(LensError::UrlNotReachable {
                url: requested.to_string(),
                status_code: status.as_u16(),
                reason: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown Status")
                ),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let headers = first_header_values(response.headers());

        let body = self.read_capped_body(requested, response).await?;

        tracing::info!(
            url = %requested,
            status_code = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            size_bytes = body.len(),
            content_type = %content_type,
            "HTTP request completed"
        );

        if !is_html_content(&content_type) {
            tracing::warn!(
                url = %requested,
                content_type = %content_type,
                "Response is not HTML content"
            );
        }

        Ok(WebPageContent {
            url: final_url,
            status_code: status.as_u16(),
            html: String::from_utf8_lossy(&body).into_owned(),
            content_type,
            headers,
        })
    }

    /// Streams the body, failing as soon as it crosses the size cap
    async fn read_capped_body(&self, url: &Url, mut response: Response) -> Result<Vec<u8>> {
        let limit = self.max_response_size;

        if let Some(declared) = response.content_length() {
            if declared > limit {
                return Err(LensError::ResponseTooLarge {
                    url: url.to_string(),
                    size: declared,
                    limit,
                });
            }
        }

        let mut body = Vec::new();
        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| LensError::UrlNotReachable {
                    url: url.to_string(),
                    status_code: 0,
                    reason: e.to_string(),
                })?;

            let Some(chunk) = chunk else {
                break;
            };

            let size = (body.len() + chunk.len()) as u64;
            if size > limit {
                return Err(LensError::ResponseTooLarge {
                    url: url.to_string(),
                    size,
                    limit,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

#[async_trait]
impl PageFetcher for WebPageFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<WebPageContent> {
        let target = self.validate_target(url).await?;
        let timeout = if timeout.is_zero() {
            self.default_timeout
        } else {
            timeout
        };

        match self
            .breaker
            .execute(|| self.fetch_with_retry(&target, timeout))
            .await
        {
            Ok(content) => Ok(content),
            Err(BreakerError::Inner(e)) => Err(e),
            Err(_) => {
                tracing::warn!(url = %target, "Circuit breaker is open");
                Err(LensError::CircuitBreakerOpen {
                    breaker: self.breaker.name().to_string(),
                })
            }
        }
    }
}

/// Returns true for HTML and XHTML content types
pub fn is_html_content(content_type: &str) -> bool {
    let content_type = content_type.to_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml")
}

/// Keeps the first value of every header, skipping non-UTF-8 values
fn first_header_values(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .keys()
        .filter_map(|name| {
            let value = headers.get(name)?.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect()
}
