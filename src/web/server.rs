//! Route table construction (C8), grounded on the teacher's `web/server.rs`: a flat list of
//! `.route(...)` calls grouped by domain, CORS/tracing layers, static asset serving.

use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::{handlers, AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // === Auth routes ===
        .route("/api/login", post(handlers::auth::login))
        .route("/api/logout", post(handlers::auth::logout))
        .route("/api/auth/check", get(handlers::auth::check))
        // === Monitor CRUD routes ===
        .route("/api/monitors", get(handlers::monitors::list).post(handlers::monitors::create))
        .route(
            "/api/monitors/{id}",
            put(handlers::monitors::update).delete(handlers::monitors::delete),
        )
        .route("/api/monitors/status", get(handlers::monitors::status_overview))
        // === Stats routes ===
        .route("/api/stats", get(handlers::stats::all_stats))
        .route("/api/stats/overview", get(handlers::stats::overview))
        .route("/api/monitors/{id}/history", get(handlers::monitors::history))
        .route("/api/monitors/{id}/stats", get(handlers::stats::for_monitor))
        // === System routes ===
        .route("/api/system/info", get(handlers::system::info))
        .route("/api/system/health", get(handlers::system::health))
        .route("/api/system/cache", get(handlers::system::cache_status))
        .route("/api/system/cache/clear", post(handlers::system::clear_cache))
        .route("/api/system/scheduler", get(handlers::system::scheduler_status))
        .nest_service("/assets", ServeDir::new("ui/dist/assets"))
        .layer(SetResponseHeaderLayer::if_not_present(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            axum::http::HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            axum::http::HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            axum::http::header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("listening on 0.0.0.0:{}", port);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Resolves on ctrl-c or, on Unix, SIGTERM — whichever arrives first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping gracefully");
}
