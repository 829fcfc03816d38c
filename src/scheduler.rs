//! The fixed-tick scheduler (C5).

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::Cache;
use crate::constants::probe::BATCH_PAUSE;
use crate::constants::scheduler::TICK_INTERVAL;
use crate::db::history::new_record;
use crate::db::monitors::apply_status_update;
use crate::db::Kv;
use crate::model::{MonitorConfig, MonitorStatus};
use crate::probe::{outcome_log, starting_log, ProbeExecutor};

const ALL_MONITOR_CONFIGS_CACHE_KEY: &str = "all_monitor_configs";

/// Snapshot exposed at `GET /api/system/scheduler` (§6).
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub execution_count: u64,
    pub last_execution_time: Option<DateTime<Utc>>,
}

struct StatusState {
    is_running: AtomicBool,
    execution_count: AtomicU64,
    last_execution_millis: AtomicI64,
}

pub struct Scheduler {
    kv: Arc<Kv>,
    cache: Arc<Cache>,
    executor: Arc<ProbeExecutor>,
    max_concurrent: usize,
    status: Arc<StatusState>,
    ticking: Arc<tokio::sync::Mutex<()>>,
}

impl Scheduler {
    pub fn new(kv: Arc<Kv>, cache: Arc<Cache>, executor: Arc<ProbeExecutor>, max_concurrent: usize) -> Self {
        Self {
            kv,
            cache,
            executor,
            max_concurrent,
            status: Arc::new(StatusState {
                is_running: AtomicBool::new(false),
                execution_count: AtomicU64::new(0),
                last_execution_millis: AtomicI64::new(0),
            }),
            ticking: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        let millis = self.status.last_execution_millis.load(Ordering::Relaxed);
        SchedulerStatus {
            is_running: self.status.is_running.load(Ordering::Relaxed),
            execution_count: self.status.execution_count.load(Ordering::Relaxed),
            last_execution_time: if millis == 0 {
                None
            } else {
                DateTime::from_timestamp_millis(millis)
            },
        }
    }

    /// Spawns the background tick loop. Mirrors the teacher's `main.rs` pattern of a
    /// `tokio::spawn` around a `tokio::time::interval` loop.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                // A previous tick must complete before the next is considered (§4.5); the
                // guard lock plus `try_lock` gives us that without blocking the interval
                // timer itself.
                if let Ok(_guard) = self.ticking.try_lock() {
                    if let Err(e) = self.run_tick().await {
                        error!("scheduler tick failed: {}", e);
                    }
                } else {
                    warn!("scheduler tick skipped: previous tick still running");
                }
            }
        })
    }

    async fn run_tick(&self) -> anyhow::Result<()> {
        self.status.is_running.store(true, Ordering::Relaxed);
        self.status.execution_count.fetch_add(1, Ordering::Relaxed);

        let configs = self.kv.list_monitors().await?;
        let now = Utc::now();
        let due: Vec<MonitorConfig> = configs
            .into_iter()
            .filter(|c| c.enabled)
            .filter(|c| is_due(c, now))
            .collect();

        if due.is_empty() {
            self.status.is_running.store(false, Ordering::Relaxed);
            self.status
                .last_execution_millis
                .store(now.timestamp_millis(), Ordering::Relaxed);
            return Ok(());
        }

        info!("scheduler tick: {} monitor(s) due", due.len());

        for batch in due.chunks(self.max_concurrent) {
            let tasks: Vec<_> = batch
                .iter()
                .cloned()
                .map(|config| {
                    let kv = self.kv.clone();
                    let executor = self.executor.clone();
                    tokio::spawn(async move { run_one(kv, executor, config).await })
                })
                .collect();

            for result in join_all(tasks).await {
                if let Err(join_error) = result {
                    error!("probe task panicked: {}", join_error);
                }
            }

            tokio::time::sleep(BATCH_PAUSE).await;
        }

        self.cache.clear_by_prefix(ALL_MONITOR_CONFIGS_CACHE_KEY).await;
        self.status.is_running.store(false, Ordering::Relaxed);
        self.status
            .last_execution_millis
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        Ok(())
    }
}

async fn run_one(kv: Arc<Kv>, executor: Arc<ProbeExecutor>, config: MonitorConfig) {
    kv.append_system_log(&starting_log(&config)).await;

    let outcome = executor.probe(&config).await;

    let record = new_record(
        &config.id,
        outcome.status,
        outcome.response_time_ms,
        outcome.http_status,
        outcome.error.clone(),
    );
    kv.append_history(&record).await;
    kv.append_system_log(&outcome_log(&config, &outcome)).await;

    let status = match outcome.status {
        crate::model::HistoryStatus::Success => MonitorStatus::Success,
        crate::model::HistoryStatus::Error => MonitorStatus::Error,
    };

    // Re-read the config instead of writing back the pre-probe snapshot: an API edit
    // (`PUT /api/monitors/:id`) may have landed while the probe was in flight, and §4.5
    // only licenses this write-back to touch the four status fields.
    match kv.get_monitor(&config.id).await {
        Some(current) => {
            let updated = apply_status_update(current, status, outcome.error);
            kv.put_monitor(&updated).await;
        }
        None => {
            debug!(monitor = %config.id, "skipping status write-back: monitor deleted during probe");
        }
    }
}

fn is_due(config: &MonitorConfig, now: DateTime<Utc>) -> bool {
    match config.last_check_at {
        None => true,
        Some(last) => {
            let elapsed_minutes = (now - last).num_minutes();
            elapsed_minutes >= config.interval_minutes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HttpMethod;

    fn config_with(last_check_at: Option<DateTime<Utc>>, interval_minutes: i64) -> MonitorConfig {
        let now = Utc::now();
        MonitorConfig {
            id: "m1".into(),
            name: "s".into(),
            url: "https://example.test".into(),
            method: HttpMethod::Get,
            cookie: None,
            headers: None,
            interval_minutes,
            enabled: true,
            last_check_at,
            status: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn never_checked_is_always_due() {
        assert!(is_due(&config_with(None, 5), Utc::now()));
    }

    #[test]
    fn due_gating_respects_interval() {
        let now = Utc::now();
        let almost_due = config_with(Some(now - chrono::Duration::minutes(2)), 5);
        assert!(!is_due(&almost_due, now));

        let due = config_with(Some(now - chrono::Duration::minutes(5)), 5);
        assert!(is_due(&due, now));
    }

    #[tokio::test]
    async fn tick_with_no_due_monitors_still_increments_execution_count() {
        let kv = Arc::new(Kv::new(":memory:").await.unwrap());
        let cache = Arc::new(Cache::new());
        let executor = Arc::new(ProbeExecutor::new(Duration::from_secs(1)));
        let scheduler = Scheduler::new(kv, cache, executor, 10);

        scheduler.run_tick().await.unwrap();
        assert_eq!(scheduler.status().execution_count, 1);
    }

    #[tokio::test]
    async fn run_one_preserves_an_edit_made_while_the_probe_was_in_flight() {
        let kv = Arc::new(Kv::new(":memory:").await.unwrap());
        let executor = Arc::new(ProbeExecutor::new(Duration::from_secs(1)));
        let original = config_with(None, 5);
        kv.put_monitor(&original).await;

        // Simulate an API edit landing after the snapshot was taken but before the
        // probe's write-back runs.
        let mut edited = original.clone();
        edited.name = "renamed-during-probe".to_string();
        edited.interval_minutes = 30;
        kv.put_monitor(&edited).await;

        run_one(kv.clone(), executor, original).await;

        let stored = kv.get_monitor("m1").await.unwrap();
        assert_eq!(stored.name, "renamed-during-probe");
        assert_eq!(stored.interval_minutes, 30);
        assert!(stored.last_check_at.is_some());
    }

    #[tokio::test]
    async fn run_one_skips_write_back_when_monitor_was_deleted_during_probe() {
        let kv = Arc::new(Kv::new(":memory:").await.unwrap());
        let executor = Arc::new(ProbeExecutor::new(Duration::from_secs(1)));
        let config = config_with(None, 5);

        run_one(kv.clone(), executor, config).await;

        assert!(kv.get_monitor("m1").await.is_none());
    }
}
