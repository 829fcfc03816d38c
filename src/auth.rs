//! Session/Auth (C6): login, logout, the auth-check extractor, and the CSRF guard.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::db::sessions::new_session;
use crate::errors::AppError;
use crate::model::Session;
use crate::web::AppState;

/// Constant-time comparison so a failed login doesn't leak timing information about how
/// many leading bytes matched (§4.6 "constant-time compare RECOMMENDED").
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Extracts the caller's IP per §4.6: `X-Forwarded-For` (first entry), then `X-Real-IP`,
/// then `CF-Connecting-IP`, else `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return real_ip.to_string();
    }
    if let Some(cf_ip) = headers.get("cf-connecting-ip").and_then(|v| v.to_str().ok()) {
        return cf_ip.to_string();
    }
    "unknown".to_string()
}

/// §4.8's same-origin CSRF guard: `Origin` or `Referer` host must equal the `Host` header.
pub fn same_origin(headers: &HeaderMap) -> bool {
    let Some(host) = headers.get("host").and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let origin_host = headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| reqwest::Url::parse(v).ok())
        .and_then(|u| u.host_str().map(str::to_string));
    let referer_host = headers
        .get("referer")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| reqwest::Url::parse(v).ok())
        .and_then(|u| u.host_str().map(str::to_string));

    let host_without_port = host.split(':').next().unwrap_or(host);
    origin_host.as_deref() == Some(host_without_port) || referer_host.as_deref() == Some(host_without_port)
}

/// Result of a login attempt, used by the `/api/login` handler.
pub enum LoginResult {
    Success(Session),
    Locked,
    BadPassword,
}

pub async fn attempt_login(
    state: &AppState,
    ip: &str,
    supplied_password: &str,
    user_agent: &str,
) -> anyhow::Result<LoginResult> {
    let failures = state
        .kv
        .recent_failed_attempts(ip, state.settings.login_lockout_minutes)
        .await?;
    if failures >= state.settings.max_login_attempts as usize {
        state.kv.record_login_attempt(ip, false).await;
        return Ok(LoginResult::Locked);
    }

    if !constant_time_eq(supplied_password, &state.settings.admin_password) {
        state.kv.record_login_attempt(ip, false).await;
        return Ok(LoginResult::BadPassword);
    }

    state.kv.record_login_attempt(ip, true).await;
    let session = new_session(ip.to_string(), user_agent.to_string(), state.settings.session_expire_hours);
    state.kv.put_session(&session).await;
    Ok(LoginResult::Success(session))
}

/// An authenticated request. Pulled in as a handler argument the way the teacher's
/// `ApiKeyAuth` is, but backed by a `session` cookie + KV lookup instead of a static bearer
/// token comparison.
pub struct AuthenticatedSession(pub Session);

impl FromRequestParts<AppState> for AuthenticatedSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_cookie(&parts.headers)
            .ok_or_else(|| AppError::AuthorizationFailed("missing session".to_string()))?;

        match state.kv.get_session(&token).await {
            Some(session) => {
                state.kv.touch_session(&token).await;
                Ok(AuthenticatedSession(session))
            }
            None => Err(AppError::AuthorizationFailed("invalid or expired session".to_string())),
        }
    }
}

/// Rejects state-changing requests that fail the same-origin check (§4.8).
pub struct RequireSameOrigin;

impl FromRequestParts<AppState> for RequireSameOrigin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        if same_origin(&parts.headers) {
            Ok(RequireSameOrigin)
        } else {
            Err(AppError::Validation("cross-origin request rejected".to_string()))
        }
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("cookie")?.to_str().ok()?;
    raw.split(';').find_map(|part| {
        let part = part.trim();
        part.strip_prefix("session=").map(str::to_string)
    })
}

pub fn set_cookie_header(token: &str, max_age_seconds: i64) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Strict; Max-Age={}; Path=/",
        token, max_age_seconds
    )
}

pub fn clear_cookie_header() -> String {
    "session=; HttpOnly; Secure; SameSite=Strict; Max-Age=0; Path=/".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn constant_time_eq_matches_equal_strings() {
        assert!(constant_time_eq("admin123", "admin123"));
        assert!(!constant_time_eq("admin123", "admin124"));
        assert!(!constant_time_eq("short", "longer-string"));
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 5.6.7.8"));
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_ip(&headers), "1.2.3.4");
    }

    #[test]
    fn client_ip_falls_back_to_unknown() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");
    }

    #[test]
    fn same_origin_accepts_matching_origin_host() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("example.test"));
        headers.insert("origin", HeaderValue::from_static("https://example.test"));
        assert!(same_origin(&headers));
    }

    #[test]
    fn same_origin_rejects_mismatched_origin_host() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("example.test"));
        headers.insert("origin", HeaderValue::from_static("https://evil.test"));
        assert!(!same_origin(&headers));
    }

    #[test]
    fn session_cookie_parses_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("foo=bar; session=abc123; other=1"));
        assert_eq!(session_cookie(&headers), Some("abc123".to_string()));
    }
}
