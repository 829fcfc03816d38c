use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::auth::{AuthenticatedSession, RequireSameOrigin};
use crate::errors::AppError;
use crate::scheduler::SchedulerStatus;
use crate::web::{ApiResponse, AppState};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    version: String,
    total_monitors: usize,
    enabled_monitors: usize,
    #[serde(rename = "uptime_ms")]
    uptime_ms: u128,
    scheduler: SchedulerStatus,
}

pub async fn info(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
) -> Result<Json<ApiResponse<SystemInfo>>, AppError> {
    let configs = state.kv.list_monitors().await?;
    let data = SystemInfo {
        version: VERSION.to_string(),
        total_monitors: configs.len(),
        enabled_monitors: configs.iter().filter(|c| c.enabled).count(),
        uptime_ms: state.started_at.elapsed().as_millis(),
        scheduler: state.scheduler.status(),
    };
    Ok(Json(ApiResponse::success(data)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    kv_store: bool,
}

#[derive(Serialize)]
pub struct SystemHealth {
    status: String,
    services: ServiceStatus,
    scheduler: SchedulerStatus,
}

/// `/api/system/health` is deliberately unauthenticated the way the teacher's own
/// liveness probe is: an orchestrator checking whether the process is up shouldn't need
/// a session.
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<SystemHealth>> {
    let kv_ok = state.kv.list_monitors().await.is_ok();
    let status = if kv_ok { "ok" } else { "degraded" };
    let data = SystemHealth {
        status: status.to_string(),
        services: ServiceStatus { kv_store: kv_ok },
        scheduler: state.scheduler.status(),
    };
    Json(ApiResponse::success(data))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    cache_size: usize,
    cache_keys: Vec<String>,
}

pub async fn cache_status(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
) -> Json<ApiResponse<CacheStatus>> {
    let keys = state.cache.keys().await;
    let data = CacheStatus {
        cache_size: keys.len(),
        cache_keys: keys,
    };
    Json(ApiResponse::success(data))
}

pub async fn clear_cache(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
    _origin: RequireSameOrigin,
) -> Json<ApiResponse<()>> {
    state.cache.clear().await;
    Json(ApiResponse::success(()))
}

pub async fn scheduler_status(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
) -> Json<ApiResponse<SchedulerStatus>> {
    Json(ApiResponse::success(state.scheduler.status()))
}
