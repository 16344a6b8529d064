use crate::config::LinkCheckerConfig;
use crate::fetcher::check_redirect;
use crate::resilience::RetryPolicy;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{redirect::Policy, Client, Method};
use std::time::Duration;
use thiserror::Error;

/// Transport-level probe failure (no HTTP status was obtained)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ProbeError(pub String);

/// Issues reachability requests for a single URL
///
/// Both methods return the final HTTP status code, or an error when no
/// response was received at all.
#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn head(&self, url: &str) -> Result<u16, ProbeError>;

    async fn get(&self, url: &str) -> Result<u16, ProbeError>;
}

/// Link probe over reqwest
///
/// Follows at most 5 redirects, under the same private-network rule as the
/// checker's targets, and retries connect/timeout errors, 429 and
/// 5xx with bounded backoff.
pub struct HttpLinkProbe {
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

const MAX_LINK_REDIRECTS: usize = 5;

fn link_redirect_policy(allow_private: bool) -> Policy {
    Policy::custom(move |attempt| {
        let verdict = check_redirect(
            attempt.url(),
            attempt.previous().len(),
            MAX_LINK_REDIRECTS,
            allow_private,
        );
        match verdict {
            Ok(()) => attempt.follow(),
            Err(e) => attempt.error(e),
        }
    })
}

impl HttpLinkProbe {
    pub fn new(config: &LinkCheckerConfig) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(link_redirect_policy(config.allow_private_networks))
            .build()?;

        Ok(Self {
            client,
            timeout: Duration::from_millis(config.timeout_ms),
            retry: config.retry_policy(),
        })
    }

    async fn request(&self, method: Method, url: &str) -> Result<u16, ProbeError> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = self
                .client
                .request(method.clone(), url)
                .timeout(self.timeout)
                .send()
                .await;

            let retry = match &outcome {
                Ok(response) => RetryPolicy::is_retryable_status(response.status().as_u16()),
                Err(e) => RetryPolicy::is_retryable_error(e),
            };

            if retry && attempt < max_attempts {
                tokio::time::sleep(self.retry.backoff(attempt - 1)).await;
                continue;
            }

            return outcome
                .map(|response| response.status().as_u16())
                .map_err(|e| ProbeError(e.to_string()));
        }
    }
}

#[async_trait]
impl LinkProbe for HttpLinkProbe {
    async fn head(&self, url: &str) -> Result<u16, ProbeError> {
        self.request(Method::HEAD, url).await
    }

    async fn get(&self, url: &str) -> Result<u16, ProbeError> {
        self.request(Method::GET, url).await
    }
}
