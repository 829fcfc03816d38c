use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthenticatedSession, RequireSameOrigin};
use crate::constants::cache::ALL_MONITOR_CONFIGS_TTL;
use crate::errors::AppError;
use crate::model::{HttpMethod, MonitorConfig, MonitorStatus};
use crate::probe::validate_method;
use crate::web::{ApiResponse, AppState};

const ALL_MONITOR_CONFIGS_CACHE_KEY: &str = "all_monitor_configs";

#[derive(Deserialize)]
pub struct MonitorConfigRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub cookie: Option<String>,
    pub headers: Option<std::collections::HashMap<String, String>>,
    pub interval_minutes: Option<i64>,
    pub enabled: Option<bool>,
}

fn validate_url(url: &str) -> bool {
    reqwest::Url::parse(url).is_ok()
}

fn validate_interval(state: &AppState, interval: i64) -> bool {
    interval >= state.settings.min_monitor_interval && interval <= state.settings.max_monitor_interval
}

pub async fn list(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
) -> Result<Json<ApiResponse<Vec<MonitorConfig>>>, AppError> {
    if let Some(cached) = state.cache.get(ALL_MONITOR_CONFIGS_CACHE_KEY).await {
        if let Ok(configs) = serde_json::from_value(cached) {
            return Ok(Json(ApiResponse::success(configs)));
        }
    }

    let configs = state.kv.list_monitors().await?;
    state
        .cache
        .set(
            ALL_MONITOR_CONFIGS_CACHE_KEY,
            serde_json::to_value(&configs).unwrap_or_default(),
            ALL_MONITOR_CONFIGS_TTL,
        )
        .await;
    Ok(Json(ApiResponse::success(configs)))
}

pub async fn create(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
    _origin: RequireSameOrigin,
    Json(body): Json<MonitorConfigRequest>,
) -> Result<(axum::http::StatusCode, Json<ApiResponse<MonitorConfig>>), AppError> {
    let name = body
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::Validation("name is required".to_string()))?;
    let url = body
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::Validation("url is required".to_string()))?;
    if !validate_url(&url) {
        return Err(AppError::Validation("url is not a valid URL".to_string()));
    }

    let method = match body.method {
        Some(raw) => validate_method(&raw).ok_or_else(|| AppError::Validation(format!("unsupported method: {raw}")))?,
        None => HttpMethod::Get,
    };

    let interval = body.interval_minutes.unwrap_or(state.settings.default_monitor_interval);
    if !validate_interval(&state, interval) {
        return Err(AppError::Validation(format!(
            "interval must be between {} and {}",
            state.settings.min_monitor_interval, state.settings.max_monitor_interval
        )));
    }

    let now = Utc::now();
    let config = MonitorConfig {
        id: Uuid::new_v4().to_string(),
        name,
        url,
        method,
        cookie: body.cookie,
        headers: body.headers,
        interval_minutes: interval,
        enabled: body.enabled.unwrap_or(true),
        last_check_at: None,
        status: None,
        last_error: None,
        created_at: now,
        updated_at: now,
    };

    if !state.kv.put_monitor(&config).await {
        return Err(AppError::Database("failed to store monitor".to_string()));
    }
    state.cache.clear_by_prefix(ALL_MONITOR_CONFIGS_CACHE_KEY).await;

    Ok((axum::http::StatusCode::CREATED, Json(ApiResponse::success(config))))
}

pub async fn update(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
    _origin: RequireSameOrigin,
    Path(id): Path<String>,
    Json(body): Json<MonitorConfigRequest>,
) -> Result<Json<ApiResponse<MonitorConfig>>, AppError> {
    let mut config = state
        .kv
        .get_monitor(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("monitor {id} not found")))?;

    if let Some(name) = body.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("name cannot be empty".to_string()));
        }
        config.name = name;
    }
    if let Some(url) = body.url {
        if !validate_url(&url) {
            return Err(AppError::Validation("url is not a valid URL".to_string()));
        }
        config.url = url;
    }
    if let Some(raw) = body.method {
        config.method = validate_method(&raw).ok_or_else(|| AppError::Validation(format!("unsupported method: {raw}")))?;
    }
    if let Some(cookie) = body.cookie {
        config.cookie = Some(cookie);
    }
    if let Some(headers) = body.headers {
        config.headers = Some(headers);
    }
    if let Some(interval) = body.interval_minutes {
        if !validate_interval(&state, interval) {
            return Err(AppError::Validation(format!(
                "interval must be between {} and {}",
                state.settings.min_monitor_interval, state.settings.max_monitor_interval
            )));
        }
        config.interval_minutes = interval;
    }
    if let Some(enabled) = body.enabled {
        config.enabled = enabled;
    }
    config.updated_at = Utc::now();

    if !state.kv.put_monitor(&config).await {
        return Err(AppError::Database("failed to update monitor".to_string()));
    }
    state.cache.clear_by_prefix(ALL_MONITOR_CONFIGS_CACHE_KEY).await;

    Ok(Json(ApiResponse::success(config)))
}

pub async fn delete(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
    _origin: RequireSameOrigin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if state.kv.get_monitor(&id).await.is_none() {
        return Err(AppError::NotFound(format!("monitor {id} not found")));
    }
    state.kv.delete_monitor_cascade(&id).await?;
    state.cache.clear_by_prefix(ALL_MONITOR_CONFIGS_CACHE_KEY).await;
    Ok(Json(ApiResponse::success(())))
}

#[derive(Serialize)]
pub struct MonitorStatusEntry {
    id: String,
    name: String,
    enabled: bool,
    status: Option<MonitorStatus>,
    last_check: Option<chrono::DateTime<Utc>>,
    last_error: Option<String>,
}

pub async fn status_overview(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
) -> Result<Json<ApiResponse<Vec<MonitorStatusEntry>>>, AppError> {
    let configs = state.kv.list_monitors().await?;
    let entries = configs
        .into_iter()
        .map(|c| MonitorStatusEntry {
            id: c.id,
            name: c.name,
            enabled: c.enabled,
            status: c.status,
            last_check: c.last_check_at,
            last_error: c.last_error,
        })
        .collect();
    Ok(Json(ApiResponse::success(entries)))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    50
}

pub async fn history(
    State(state): State<AppState>,
    _session: AuthenticatedSession,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<crate::model::MonitorHistory>>>, AppError> {
    let records = state.kv.recent_history(&id, query.limit).await?;
    Ok(Json(ApiResponse::success(records)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_url_rejects_garbage() {
        assert!(!validate_url("not a url"));
        assert!(validate_url("https://example.test"));
    }
}
