use sitelens::config::Config;
use sitelens::domain::{AnalysisStatus, HtmlVersion};
use sitelens::service::{Handler, HandlerChain, LoggingInterceptor, Request, Response, ServiceHandler};
use sitelens::{AnalysisOptions, AnalysisService};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.fetcher.allow_private_networks = true;
    config.fetcher.max_retries = 0;
    config.link_checker.retries = 0;
    config.link_checker.allow_private_networks = true;
    config.storage.database_path = dir.path().join("sitelens.db").display().to_string();
    config
}

#[tokio::test]
async fn test_analyze_page_end_to_end() {
    let site = MockServer::start().await;
    let elsewhere = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<!DOCTYPE html>
<html><head><title>Test Site</title></head>
<body>
  <h1>Welcome</h1><h2>One</h2><h2>Two</h2>
  <a href="/about">About</a>
  <a href="/about">About again</a>
  <a href="{0}/fine">Fine</a>
  <a href="{0}/dead">Dead</a>
  <a href="mailto:someone@example.com">Mail</a>
  <form method="POST" action="/session">
    <input type="email" name="email">
    <input type="password" name="password">
  </form>
</body></html>"#,
                    elsewhere.uri()
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(&site)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/fine"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&elsewhere)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/dead"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&elsewhere)
        .await;

    let dir = TempDir::new().unwrap();
    let service = AnalysisService::from_config(&test_config(&dir)).unwrap();
    let options = AnalysisOptions::default();

    let started = service
        .start_analysis(&format!("{}/", site.uri()), &options)
        .await
        .unwrap();
    assert_eq!(started.status, AnalysisStatus::Requested);

    let done = service
        .execute_analysis(&started.id.to_string(), &options)
        .await
        .unwrap();
    assert_eq!(done.status, AnalysisStatus::Completed);

    let results = done.results.as_ref().unwrap();
    assert_eq!(results.html_version, HtmlVersion::Html5);
    assert_eq!(results.title, "Test Site");
    assert_eq!(results.heading_counts.h1, 1);
    assert_eq!(results.heading_counts.h2, 2);
    assert_eq!(results.links.internal_count, 1);
    assert_eq!(results.links.external_count, 2);
    assert_eq!(results.links.inaccessible_links.len(), 1);
    assert_eq!(
        results.links.inaccessible_links[0].url,
        format!("{}/dead", elsewhere.uri())
    );
    assert_eq!(results.forms.login_forms_detected, 1);

    let fetched = service.fetch_analysis(&started.id.to_string()).await.unwrap();
    assert_eq!(fetched, done);
}

#[tokio::test]
async fn test_unreachable_page_marks_failed() {
    let site = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&site)
        .await;

    let dir = TempDir::new().unwrap();
    let service = AnalysisService::from_config(&test_config(&dir)).unwrap();
    let options = AnalysisOptions::default();

    let started = service
        .start_analysis(&format!("{}/nothing", site.uri()), &options)
        .await
        .unwrap();
    let done = service
        .execute_analysis(&started.id.to_string(), &options)
        .await
        .unwrap();

    assert_eq!(done.status, AnalysisStatus::Failed);
    let error = done.error.unwrap();
    assert_eq!(error.code, "URL_NOT_REACHABLE");
    assert_eq!(error.status_code, Some(404));
}

#[tokio::test]
async fn test_analysis_survives_restart() {
    let site = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><title>Kept</title></html>"))
        .mount(&site)
        .await;

    let dir = TempDir::new().unwrap();
    let options = AnalysisOptions {
        check_links: false,
        ..AnalysisOptions::default()
    };

    let id = {
        let service = AnalysisService::from_config(&test_config(&dir)).unwrap();
        let started = service.start_analysis(&site.uri(), &options).await.unwrap();
        service
            .execute_analysis(&started.id.to_string(), &options)
            .await
            .unwrap();
        started.id.to_string()
    };

    // A fresh service has an empty cache and reads from the database
    let service = Arc::new(AnalysisService::from_config(&test_config(&dir)).unwrap());
    let chain = HandlerChain::new(Arc::new(ServiceHandler::new(service)))
        .with(Arc::new(LoggingInterceptor));

    let response = chain.handle(Request::FetchAnalysis { id }).await.unwrap();
    let Response::Analysis(analysis) = response else {
        panic!("expected an analysis");
    };
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert_eq!(analysis.results.unwrap().title, "Kept");
}
