use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{
    attempt_login, clear_cookie_header, client_ip, same_origin, set_cookie_header, AuthenticatedSession,
    LoginResult, RequireSameOrigin,
};
use crate::db::sessions::cookie_max_age_seconds;
use crate::errors::AppError;
use crate::web::{ApiResponse, AppState};

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Serialize)]
pub struct LoginData {
    authenticated: bool,
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Response, AppError> {
    if !same_origin(&headers) {
        return Err(AppError::Validation("cross-origin login rejected".to_string()));
    }

    let ip = client_ip(&headers);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let result = attempt_login(&state, &ip, &body.password, &user_agent).await?;

    match result {
        LoginResult::Success(session) => {
            let cookie = set_cookie_header(&session.id, cookie_max_age_seconds(state.settings.session_expire_hours));
            let body = ApiResponse::success(LoginData { authenticated: true });
            Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
        }
        LoginResult::Locked => Err(AppError::RateLimited("登录尝试次数过多".to_string())),
        LoginResult::BadPassword => Err(AppError::AuthenticationFailed("密码错误".to_string())),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    _origin: RequireSameOrigin,
) -> Response {
    if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        if let Some(token) = cookie_header
            .split(';')
            .find_map(|part| part.trim().strip_prefix("session="))
        {
            state.kv.delete_session(token).await;
        }
    }

    let body: ApiResponse<()> = ApiResponse::success(());
    (StatusCode::OK, [(header::SET_COOKIE, clear_cookie_header())], Json(body)).into_response()
}

#[derive(Serialize)]
pub struct AuthCheckData {
    authenticated: bool,
    session: Option<crate::model::Session>,
}

pub async fn check(session: Option<AuthenticatedSession>) -> Json<ApiResponse<AuthCheckData>> {
    let data = match session {
        Some(AuthenticatedSession(session)) => AuthCheckData {
            authenticated: true,
            session: Some(session),
        },
        None => AuthCheckData {
            authenticated: false,
            session: None,
        },
    };
    Json(ApiResponse::success(data))
}
