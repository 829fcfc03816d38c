use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedSession;
use crate::constants::cache::MONITOR_STATS_TTL;
use crate::errors::AppError;
use crate::stats::{compute_stats, MonitorStats, Period};
use crate::web::{ApiResponse, AppState};

#[derive(Deserialize)]
pub struct PeriodQuery {
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_period() -> String {
    "24h".to_string()
}

pub async fn all_stats(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<ApiResponse<Vec<MonitorStats>>>, AppError> {
    let period = Period::parse(&query.period).ok_or_else(|| AppError::Validation("invalid period".to_string()))?;
    let configs = state.kv.list_monitors().await?;

    let mut all = Vec::with_capacity(configs.len());
    for config in configs {
        let stats = load_or_compute(&state, &config.id, &config.name, period).await?;
        all.push(stats);
    }
    Ok(Json(ApiResponse::success(all)))
}

pub async fn for_monitor(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
    Path(id): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<ApiResponse<MonitorStats>>, AppError> {
    let period = Period::parse(&query.period).ok_or_else(|| AppError::Validation("invalid period".to_string()))?;
    let config = state
        .kv
        .get_monitor(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("monitor {id} not found")))?;

    let stats = load_or_compute(&state, &config.id, &config.name, period).await?;
    Ok(Json(ApiResponse::success(stats)))
}

async fn load_or_compute(
    state: &AppState,
    monitor_id: &str,
    monitor_name: &str,
    period: Period,
) -> Result<MonitorStats, AppError> {
    let cache_key = format!("monitor_stats_{}_{:?}", monitor_id, period);
    if let Some(cached) = state.cache.get(&cache_key).await {
        if let Ok(stats) = serde_json::from_value(cached) {
            return Ok(stats);
        }
    }

    let stats = compute_stats(&state.kv, monitor_id, monitor_name, period).await?;
    state
        .cache
        .set(&cache_key, serde_json::to_value(&stats).unwrap_or_default(), MONITOR_STATS_TTL)
        .await;
    Ok(stats)
}

#[derive(Serialize)]
pub struct StatsOverview {
    total: usize,
    enabled: usize,
    success: usize,
    error: usize,
    pending: usize,
}

pub async fn overview(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
) -> Result<Json<ApiResponse<StatsOverview>>, AppError> {
    let configs = state.kv.list_monitors().await?;
    let mut overview = StatsOverview {
        total: configs.len(),
        enabled: 0,
        success: 0,
        error: 0,
        pending: 0,
    };
    for config in &configs {
        if config.enabled {
            overview.enabled += 1;
        }
        match config.status {
            Some(crate::model::MonitorStatus::Success) => overview.success += 1,
            Some(crate::model::MonitorStatus::Error) => overview.error += 1,
            _ => overview.pending += 1,
        }
    }
    Ok(Json(ApiResponse::success(overview)))
}
