//! Periodic GC of expired sessions, old history, and old logs (C9).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info};

use crate::db::Kv;
use crate::settings::Settings;

pub struct MaintenanceJob {
    kv: Arc<Kv>,
    settings: Arc<Settings>,
}

impl MaintenanceJob {
    pub fn new(kv: Arc<Kv>, settings: Arc<Settings>) -> Self {
        Self { kv, settings }
    }

    /// Runs the three sweeps in parallel; each is independent, so one's failure does not
    /// abort the others (§4.9).
    pub async fn run_once(&self) {
        let history_cutoff = Utc::now() - chrono::Duration::days(self.settings.history_retention_days);

        let (sessions, history, logs) = tokio::join!(
            self.kv.sweep_expired_sessions(),
            sweep_history(&self.kv, history_cutoff),
            self.kv.sweep_old_system_logs(),
        );

        let sessions_removed = log_sweep_result("sessions", sessions);
        let history_removed = log_sweep_result("history", history);
        let logs_removed = log_sweep_result("system logs", logs);

        info!(
            sessions_removed,
            history_removed, logs_removed, "maintenance sweep complete"
        );
    }

    /// Spawns the background loop: once at startup, then on `MAINTENANCE_INTERVAL_HOURS`.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run_once().await;
            let period = Duration::from_secs((self.settings.maintenance_interval_hours.max(1) as u64) * 3600);
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick fires immediately; we already ran once above
            loop {
                interval.tick().await;
                self.run_once().await;
            }
        })
    }
}

fn log_sweep_result(label: &str, result: anyhow::Result<u64>) -> u64 {
    match result {
        Ok(count) => count,
        Err(e) => {
            error!("maintenance sweep for {} failed: {}", label, e);
            0
        }
    }
}

/// Deletes history older than `cutoff` across every monitor. The KV has no global
/// time-ordered index over history (it's indexed per-monitor), so this scans monitor
/// configs first the way the teacher's own cleanup passes enumerate targets before acting.
async fn sweep_history(kv: &Kv, cutoff: chrono::DateTime<Utc>) -> anyhow::Result<u64> {
    let configs = kv.list_monitors().await?;
    let deletions = configs.into_iter().map(|config| {
        let kv = kv;
        async move { delete_history_before(kv, &config.id, cutoff).await }
    });
    let results = join_all(deletions).await;
    Ok(results.into_iter().filter_map(Result::ok).sum())
}

async fn delete_history_before(kv: &Kv, monitor_id: &str, cutoff: chrono::DateTime<Utc>) -> anyhow::Result<u64> {
    let prefix = crate::db::subtree_prefix(&["history", monitor_id]);
    let rows = kv.range(&prefix, false, None).await?;
    let mut removed = 0u64;
    for (key, value) in rows {
        if let Ok(record) = serde_json::from_str::<crate::model::MonitorHistory>(&value) {
            if record.timestamp < cutoff && kv.delete(&key).await {
                removed += 1;
            }
        }
    }
    Ok(removed)
}
