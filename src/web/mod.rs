pub mod handlers;
pub mod server;

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::cache::Cache;
use crate::db::Kv;
use crate::probe::ProbeExecutor;
use crate::scheduler::Scheduler;
use crate::settings::Settings;

/// Shared process state, built once in `main` and handed to axum via `.with_state`.
/// Mirrors the teacher's `AppState`, generalized from node-management handles to the
/// monitoring control plane's own singletons.
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<Kv>,
    pub cache: Arc<Cache>,
    pub scheduler: Arc<Scheduler>,
    pub executor: Arc<ProbeExecutor>,
    pub settings: Arc<Settings>,
    pub started_at: Instant,
}

/// The uniform `{success, data?, error?, code?, timestamp}` envelope (§4.8), an extension
/// of the teacher's `ApiResponse<T>` with the `error`/`code` pair this spec's taxonomy needs
/// in place of the teacher's single `message` field.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
