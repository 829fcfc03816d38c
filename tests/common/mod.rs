//! Shared test scaffolding: spins up a real `sitewatch` server on an ephemeral port
//! backed by an in-memory KV store, the way the teacher's `tests/common/fixtures`
//! gives integration tests a `TestDatabase` to point a real server at.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use sitewatch::cache::Cache;
use sitewatch::db::Kv;
use sitewatch::probe::ProbeExecutor;
use sitewatch::scheduler::Scheduler;
use sitewatch::settings::Settings;
use sitewatch::web::{server, AppState};

pub struct TestServer {
    pub base_url: String,
    pub kv: Arc<Kv>,
    pub client: reqwest::Client,
}

pub fn test_settings() -> Settings {
    Settings {
        admin_password: "admin123".to_string(),
        session_expire_hours: 24,
        default_monitor_interval: 1,
        min_monitor_interval: 1,
        max_monitor_interval: 60,
        history_retention_days: 30,
        max_concurrent_monitors: 10,
        request_timeout: Duration::from_secs(5),
        login_lockout_minutes: 15,
        max_login_attempts: 5,
        log_level: "info".to_string(),
        port: 0,
        database_path: ":memory:".to_string(),
        maintenance_interval_hours: 1,
    }
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_settings(test_settings()).await
    }

    pub async fn start_with_settings(settings: Settings) -> Self {
        let kv = Arc::new(Kv::new(&settings.database_path).await.unwrap());
        let cache = Arc::new(Cache::new());
        let executor = Arc::new(ProbeExecutor::new(settings.request_timeout));
        let scheduler = Arc::new(Scheduler::new(kv.clone(), cache.clone(), executor.clone(), settings.max_concurrent_monitors));
        let settings = Arc::new(settings);

        let state = AppState {
            kv: kv.clone(),
            cache,
            scheduler,
            executor,
            settings,
            started_at: Instant::now(),
        };

        let router = server::create_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        TestServer {
            base_url: format!("http://{}", addr),
            kv,
            client: reqwest::Client::new(),
        }
    }

    /// `Origin`/`Referer` matching `Host` so the CSRF guard (§4.8) lets the request through.
    pub fn same_origin_headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::ORIGIN, self.base_url.parse().unwrap());
        headers
    }

    pub async fn login(&self, password: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/login", self.base_url))
            .headers(self.same_origin_headers())
            .json(&serde_json::json!({ "password": password }))
            .send()
            .await
            .unwrap()
    }

    pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
        response
            .headers()
            .get(reqwest::header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|raw| raw.split(';').next())
            .map(str::to_string)
    }

    pub async fn authenticated_session(&self) -> String {
        let response = self.login("admin123").await;
        Self::session_cookie(&response).expect("login must set a session cookie")
    }
}
