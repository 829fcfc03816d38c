//! The one-shot HTTP probe executor (C4).

use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::time::timeout;
use tracing::warn;
use reqwest::Url;

use crate::constants::probe::{MAX_RETRIES, RETRY_BACKOFF};
use crate::constants::CLOUDSTUDIO_AFFINITY_FRAGMENTS;
use crate::model::{HistoryStatus, HttpMethod, MonitorConfig};

pub struct ProbeOutcome {
    pub status: HistoryStatus,
    pub response_time_ms: Option<i64>,
    pub http_status: Option<u16>,
    pub error: Option<String>,
}

pub struct ProbeExecutor {
    client: Client,
    request_timeout: Duration,
}

impl ProbeExecutor {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()
                .expect("reqwest client configuration is valid"),
            request_timeout,
        }
    }

    /// Runs the full probe algorithm of §4.4: URL validation, one dispatch with up to
    /// `MAX_RETRIES` retries on network/timeout error, response classification.
    pub async fn probe(&self, config: &MonitorConfig) -> ProbeOutcome {
        let Ok(url) = Url::parse(&config.url) else {
            return ProbeOutcome {
                status: HistoryStatus::Error,
                response_time_ms: None,
                http_status: None,
                error: Some(format!("invalid URL: {}", config.url)),
            };
        };

        let mut attempt = 0u32;
        loop {
            let started = Instant::now();
            match self.dispatch(config, &url).await {
                Ok(outcome) => return outcome,
                Err(ProbeError::Cancelled) => {
                    return ProbeOutcome {
                        status: HistoryStatus::Error,
                        response_time_ms: Some(started.elapsed().as_millis() as i64),
                        http_status: None,
                        error: Some("request cancelled (timeout)".to_string()),
                    };
                }
                Err(ProbeError::Network(message)) => {
                    if attempt >= MAX_RETRIES {
                        return ProbeOutcome {
                            status: HistoryStatus::Error,
                            response_time_ms: Some(started.elapsed().as_millis() as i64),
                            http_status: None,
                            error: Some(message),
                        };
                    }
                    warn!(
                        monitor = %config.id,
                        attempt,
                        "probe attempt failed, retrying: {}",
                        message
                    );
                    tokio::time::sleep(RETRY_BACKOFF[attempt as usize]).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn dispatch(&self, config: &MonitorConfig, url: &Url) -> Result<ProbeOutcome, ProbeError> {
        let method = config.method.as_reqwest();
        let mut request = self.client.request(method, url.clone());

        request = request.header("User-Agent", DEFAULT_USER_AGENT);
        request = request.header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8");
        if let Some(headers) = &config.headers {
            for (key, value) in headers {
                request = request.header(key.as_str(), value.as_str());
            }
        }
        if let Some(cookie) = &config.cookie {
            if !cookie.is_empty() {
                request = request.header("Cookie", cookie.as_str());
            }
        }
        if let Some(host) = url.host_str() {
            let origin = format!("{}://{}", url.scheme(), host);
            request = request.header("Origin", origin.clone());
            request = request.header("Referer", origin);
        }

        let started = Instant::now();
        let response = timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| ProbeError::Cancelled)?
            .map_err(|e| ProbeError::Network(format!("HTTP request failed: {}", e)))?;

        let elapsed_ms = started.elapsed().as_millis() as i64;
        let status = response.status();
        let final_url = response.url().clone();

        if status.is_client_error() || status.is_server_error() {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            return Ok(ProbeOutcome {
                status: HistoryStatus::Error,
                response_time_ms: Some(elapsed_ms),
                http_status: Some(status.as_u16()),
                error: Some(format!("HTTP {}: {}", status.as_u16(), reason)),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::Network(format!("failed to read response body: {}", e)))?;

        if check_response_success(&config.url, &final_url, &body) {
            Ok(ProbeOutcome {
                status: HistoryStatus::Success,
                response_time_ms: Some(elapsed_ms),
                http_status: Some(status.as_u16()),
                error: None,
            })
        } else {
            Ok(ProbeOutcome {
                status: HistoryStatus::Error,
                response_time_ms: Some(elapsed_ms),
                http_status: Some(status.as_u16()),
                error: Some("响应不符合预期".to_string()),
            })
        }
    }
}

enum ProbeError {
    Network(String),
    Cancelled,
}

/// §4.4 step 3: body length > 0, plus a cloudstudio-specific host-affinity check left as a
/// hard-coded rule per the open question in §9.
fn check_response_success(original_url: &str, final_url: &Url, body: &str) -> bool {
    if body.is_empty() {
        return false;
    }

    let original_is_cloudstudio = original_url.contains(crate::constants::CLOUDSTUDIO_HOST_FRAGMENT);
    if !original_is_cloudstudio {
        return true;
    }

    let final_host = final_url.host_str().unwrap_or("");
    CLOUDSTUDIO_AFFINITY_FRAGMENTS
        .iter()
        .any(|fragment| final_host.contains(fragment))
}

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Logs the start of a probe as an INFO system-log entry (§4.4 side effects).
pub fn starting_log(config: &MonitorConfig) -> crate::model::SystemLog {
    crate::db::system_logs::new_monitor_log(
        crate::model::LogLevel::Info,
        format!("probing {}", config.url),
        &config.id,
        &config.name,
    )
}

/// Logs the terminal outcome of a probe (§4.4 side effects).
pub fn outcome_log(config: &MonitorConfig, outcome: &ProbeOutcome) -> crate::model::SystemLog {
    let level = match outcome.status {
        HistoryStatus::Success => crate::model::LogLevel::Info,
        HistoryStatus::Error => crate::model::LogLevel::Warn,
    };
    let message = match &outcome.error {
        Some(err) => format!("probe for {} failed: {}", config.name, err),
        None => format!("probe for {} succeeded", config.name),
    };
    crate::db::system_logs::new_monitor_log(level, message, &config.id, &config.name)
}

/// Validates the `method` field accepted from write endpoints (§4.8).
pub fn validate_method(raw: &str) -> Option<HttpMethod> {
    HttpMethod::parse(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_never_successful() {
        let url = Url::parse("https://example.test").unwrap();
        assert!(!check_response_success("https://example.test", &url, ""));
    }

    #[test]
    fn non_cloudstudio_target_only_needs_nonempty_body() {
        let url = Url::parse("https://example.test/redirected").unwrap();
        assert!(check_response_success("https://example.test", &url, "hi"));
    }

    #[test]
    fn cloudstudio_target_requires_affinity_on_final_host() {
        let redirected_away = Url::parse("https://evil.test").unwrap();
        assert!(!check_response_success(
            "https://app.cloudstudio.net",
            &redirected_away,
            "hi"
        ));

        let redirected_within = Url::parse("https://edge.cloudstudio.club").unwrap();
        assert!(check_response_success(
            "https://app.cloudstudio.net",
            &redirected_within,
            "hi"
        ));
    }
}
