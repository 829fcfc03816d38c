use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use sitewatch::cache::Cache;
use sitewatch::db::Kv;
use sitewatch::maintenance::MaintenanceJob;
use sitewatch::probe::ProbeExecutor;
use sitewatch::scheduler::Scheduler;
use sitewatch::settings::Settings;
use sitewatch::web::{server, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Arc::new(Settings::from_env()?);

    let env_filter = EnvFilter::from_default_env()
        .add_directive(format!("sitewatch={}", settings.log_level).parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("sqlx=warn".parse()?);
    fmt().with_env_filter(env_filter).init();

    info!("starting sitewatch monitoring control plane");

    let kv = Arc::new(Kv::new(&settings.database_path).await?);
    let cache = Arc::new(Cache::new());
    let executor = Arc::new(ProbeExecutor::new(settings.request_timeout));

    let scheduler = Arc::new(Scheduler::new(
        kv.clone(),
        cache.clone(),
        executor.clone(),
        settings.max_concurrent_monitors,
    ));
    scheduler.clone().spawn();
    info!("scheduler started (tick every 60s)");

    let maintenance = Arc::new(MaintenanceJob::new(kv.clone(), settings.clone()));
    maintenance.spawn();
    info!("maintenance job started");

    spawn_cache_sweeper(cache.clone());

    let state = AppState {
        kv,
        cache,
        scheduler,
        executor,
        settings: settings.clone(),
        started_at: Instant::now(),
    };

    let port = settings.port;
    server::serve(state, port).await?;

    Ok(())
}

/// Background TTL sweep for the cache (§4.2's `CACHE_CLEANUP` interval), spawned the way
/// the teacher spawns its own periodic cleanup loops in `main.rs`.
fn spawn_cache_sweeper(cache: Arc<Cache>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sitewatch::constants::cache::CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cache.cleanup().await;
        }
    });
}
