//! The error taxonomy returned by the HTTP API, and its conversions from lower layers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    AuthenticationFailed(String),
    AuthorizationFailed(String),
    NotFound(String),
    Database(String),
    Network(String),
    RateLimited(String),
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> i32 {
        match self {
            AppError::Validation(_) => 1001,
            AppError::AuthenticationFailed(_) => 1002,
            AppError::AuthorizationFailed(_) => 1003,
            AppError::NotFound(_) => 1004,
            AppError::Database(_) => 2001,
            AppError::Network(_) => 2002,
            AppError::RateLimited(_) => 3001,
            AppError::Internal(_) => 5001,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationFailed(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Network(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation(m)
            | AppError::AuthenticationFailed(m)
            | AppError::AuthorizationFailed(m)
            | AppError::NotFound(m)
            | AppError::Database(m)
            | AppError::Network(m)
            | AppError::RateLimited(m)
            | AppError::Internal(m) => m,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
    code: i32,
    timestamp: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Internal(_)) {
            tracing::error!(code = self.code(), "unhandled error: {}", self.message());
        } else {
            tracing::warn!(code = self.code(), "request error: {}", self.message());
        }

        let body = ErrorEnvelope {
            success: false,
            error: self.message().to_string(),
            code: self.code(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (self.status(), Json(body)).into_response()
    }
}
