//! Exercises the probe executor (C4) against real HTTP responses via `wiremock`, covering
//! the classification scenarios from spec.md §8.

use std::time::Duration;

use sitewatch::model::{HistoryStatus, HttpMethod, MonitorConfig};
use sitewatch::probe::ProbeExecutor;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(url: String) -> MonitorConfig {
    let now = chrono::Utc::now();
    MonitorConfig {
        id: "m1".to_string(),
        name: "site".to_string(),
        url,
        method: HttpMethod::Get,
        cookie: None,
        headers: None,
        interval_minutes: 1,
        enabled: true,
        last_check_at: None,
        status: None,
        last_error: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn successful_probe_is_classified_success_with_http_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hi"))
        .mount(&mock_server)
        .await;

    let executor = ProbeExecutor::new(Duration::from_secs(5));
    let outcome = executor.probe(&config_for(format!("{}/ok", mock_server.uri()))).await;

    assert_eq!(outcome.status, HistoryStatus::Success);
    assert_eq!(outcome.http_status, Some(200));
    assert!(outcome.error.is_none());
    assert!(outcome.response_time_ms.is_some());
}

#[tokio::test]
async fn forbidden_response_is_classified_as_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/403"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let executor = ProbeExecutor::new(Duration::from_secs(5));
    let outcome = executor.probe(&config_for(format!("{}/403", mock_server.uri()))).await;

    assert_eq!(outcome.status, HistoryStatus::Error);
    assert_eq!(outcome.http_status, Some(403));
    assert_eq!(outcome.error.as_deref(), Some("HTTP 403: Forbidden"));
}

#[tokio::test]
async fn empty_body_is_classified_as_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let executor = ProbeExecutor::new(Duration::from_secs(5));
    let outcome = executor.probe(&config_for(format!("{}/empty", mock_server.uri()))).await;

    assert_eq!(outcome.status, HistoryStatus::Error);
    assert_eq!(outcome.error.as_deref(), Some("响应不符合预期"));
}

#[tokio::test]
async fn timeout_is_classified_as_error_after_retries_collapse_to_one_record() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hi").set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let executor = ProbeExecutor::new(Duration::from_millis(200));
    let outcome = executor.probe(&config_for(format!("{}/slow", mock_server.uri()))).await;

    assert_eq!(outcome.status, HistoryStatus::Error);
    assert!(outcome.error.as_deref().unwrap().contains("cancel"));
}

#[tokio::test]
async fn invalid_url_is_rejected_without_a_network_call() {
    let executor = ProbeExecutor::new(Duration::from_secs(5));
    let outcome = executor.probe(&config_for("not a url".to_string())).await;

    assert_eq!(outcome.status, HistoryStatus::Error);
    assert!(outcome.http_status.is_none());
}
