use sitelens::config::FetcherConfig;
use sitelens::fetcher::{build_http_client, PageFetcher, RedirectError, WebPageFetcher};
use sitelens::LensError;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fetcher config that may reach the local mock server and retries quickly
fn test_config() -> FetcherConfig {
    FetcherConfig {
        user_agent: "SiteLensTest/1.0".to_string(),
        timeout_ms: 5_000,
        max_retries: 2,
        retry_wait_time_ms: 10,
        max_retry_wait_time_ms: 20,
        allow_private_networks: true,
        ..FetcherConfig::default()
    }
}

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<!DOCTYPE html><title>Hello</title>")
                .insert_header("content-type", "text/html; charset=utf-8")
                .insert_header("x-request-id", "abc123"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = WebPageFetcher::new(&test_config()).unwrap();
    let url = format!("{}/page", mock_server.uri());
    let content = fetcher.fetch(&url, TIMEOUT).await.unwrap();

    assert_eq!(content.status_code, 200);
    assert_eq!(content.url, url);
    assert!(content.html.contains("<title>Hello</title>"));
    assert!(content.content_type.starts_with("text/html"));
    assert_eq!(content.headers.get("x-request-id").map(String::as_str), Some("abc123"));

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].headers.get("user-agent").unwrap().to_str().unwrap(),
        "SiteLensTest/1.0"
    );
}

#[tokio::test]
async fn test_fetch_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = WebPageFetcher::new(&test_config()).unwrap();
    let err = fetcher
        .fetch(&format!("{}/missing", mock_server.uri()), TIMEOUT)
        .await
        .unwrap_err();

    match err {
        LensError::UrlNotReachable {
            status_code, reason, ..
        } => {
            assert_eq!(status_code, 404);
            assert_eq!(reason, "HTTP 404: Not Found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_retries_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&mock_server)
        .await;

    let fetcher = WebPageFetcher::new(&test_config()).unwrap();
    let content = fetcher.fetch(&mock_server.uri(), TIMEOUT).await.unwrap();

    assert_eq!(content.status_code, 200);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_fetch_rejects_oversized_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&mock_server)
        .await;

    let config = FetcherConfig {
        max_response_size_bytes: 1024,
        ..test_config()
    };
    let fetcher = WebPageFetcher::new(&config).unwrap();
    let err = fetcher.fetch(&mock_server.uri(), TIMEOUT).await.unwrap_err();

    assert!(matches!(err, LensError::ResponseTooLarge { limit: 1024, .. }));
    assert_eq!(err.status_code(), 413);
}

#[tokio::test]
async fn test_breaker_opens_after_repeated_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = FetcherConfig {
        max_retries: 0,
        ..test_config()
    };
    let fetcher = WebPageFetcher::new(&config).unwrap();

    for _ in 0..3 {
        let err = fetcher.fetch(&mock_server.uri(), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, LensError::UrlNotReachable { status_code: 500, .. }));
    }

    let err = fetcher.fetch(&mock_server.uri(), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, LensError::CircuitBreakerOpen { .. }));
    assert_eq!(err.code(), "CIRCUIT_BREAKER_OPEN");

    // The open breaker short-circuits without touching the server
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_private_targets_blocked_by_default() {
    let mock_server = MockServer::start().await;

    let fetcher = WebPageFetcher::new(&FetcherConfig::default()).unwrap();
    let err = fetcher.fetch(&mock_server.uri(), TIMEOUT).await.unwrap_err();

    assert!(matches!(err, LensError::InvalidUrl { .. }));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_redirect_into_private_network_is_not_followed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/admin", mock_server.uri()).as_str()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(0)
        .mount(&mock_server)
        .await;

    // The first request is guarded by the fetcher; the client only sees hops
    let client = build_http_client("SiteLensTest/1.0", 10, false).unwrap();
    let err = client
        .get(format!("{}/start", mock_server.uri()))
        .send()
        .await
        .unwrap_err();

    assert!(err.is_redirect());
    let source = std::error::Error::source(&err)
        .and_then(|s| s.downcast_ref::<RedirectError>())
        .expect("redirect error source");
    assert!(matches!(source, RedirectError::Refused(_)));
}

#[tokio::test]
async fn test_redirects_followed_when_private_allowed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><title>Moved</title></html>")
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = WebPageFetcher::new(&test_config()).unwrap();
    let content = fetcher
        .fetch(&format!("{}/old", mock_server.uri()), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(content.url, format!("{}/new", mock_server.uri()));
    assert!(content.html.contains("Moved"));
}

#[tokio::test]
async fn test_redirect_loop_stops_at_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&mock_server)
        .await;

    let config = FetcherConfig {
        max_retries: 0,
        max_redirects: 3,
        ..test_config()
    };
    let fetcher = WebPageFetcher::new(&config).unwrap();
    let err = fetcher
        .fetch(&format!("{}/loop", mock_server.uri()), TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, LensError::UrlNotReachable { status_code: 0, .. }));
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
}
