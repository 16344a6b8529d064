use sitelens::checker::{ConcurrentLinkChecker, LinkChecker};
use sitelens::config::LinkCheckerConfig;
use sitelens::domain::{Link, LinkKind};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> LinkCheckerConfig {
    LinkCheckerConfig {
        timeout_ms: 2_000,
        retries: 0,
        allow_private_networks: true,
        ..LinkCheckerConfig::default()
    }
}

fn external(url: String) -> Link {
    Link::new(url, LinkKind::External)
}

#[tokio::test]
async fn test_reports_only_failing_links() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let base = mock_server.uri();
    let links = vec![
        external(format!("{}/ok", base)),
        external(format!("{}/gone", base)),
        external(format!("{}/broken", base)),
        Link::new(format!("{}/internal-missing", base), LinkKind::Internal),
    ];

    let checker = ConcurrentLinkChecker::new(&test_config()).unwrap();
    let mut inaccessible = checker.check_accessibility(&links).await;
    inaccessible.sort_by(|a, b| a.url.cmp(&b.url));

    assert_eq!(inaccessible.len(), 2);
    assert_eq!(inaccessible[0].url, format!("{}/broken", base));
    assert_eq!(inaccessible[0].status_code, 500);
    assert_eq!(inaccessible[0].error, "500 Internal Server Error");
    assert_eq!(inaccessible[1].url, format!("{}/gone", base));
    assert_eq!(inaccessible[1].status_code, 404);
    assert_eq!(inaccessible[1].error, "404 Not Found");
}

#[tokio::test]
async fn test_unreachable_host_reports_status_zero() {
    // Port 1 on loopback refuses connections
    let links = vec![external("http://127.0.0.1:1/".to_string())];

    let checker = ConcurrentLinkChecker::new(&test_config()).unwrap();
    let inaccessible = checker.check_accessibility(&links).await;

    assert_eq!(inaccessible.len(), 1);
    assert_eq!(inaccessible[0].status_code, 0);
    assert!(!inaccessible[0].error.is_empty());
}

#[tokio::test]
async fn test_probe_sends_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = LinkCheckerConfig {
        user_agent: "ProbeBot/2.0".to_string(),
        ..test_config()
    };
    let checker = ConcurrentLinkChecker::new(&config).unwrap();
    let inaccessible = checker
        .check_accessibility(&[external(format!("{}/x", mock_server.uri()))])
        .await;

    assert!(inaccessible.is_empty());
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].headers.get("user-agent").unwrap().to_str().unwrap(),
        "ProbeBot/2.0"
    );
}

#[tokio::test]
async fn test_local_links_not_requested_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = LinkCheckerConfig {
        allow_private_networks: false,
        ..test_config()
    };
    let checker = ConcurrentLinkChecker::new(&config).unwrap();
    let inaccessible = checker
        .check_accessibility(&[
            external(format!("{}/internal", mock_server.uri())),
            external("http://127.0.0.1:1/".to_string()),
        ])
        .await;

    assert!(inaccessible.is_empty());
}
