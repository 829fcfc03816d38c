//! `(system_logs, <time_key>, <id>)` — reverse scan = newest-first (§6).

use anyhow::Result;
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::constants::logs::{MAX_SYSTEM_LOGS_SCAN, RETENTION_DAYS};
use crate::model::{LogLevel, SystemLog};

use super::{join_key, time_key, Kv};

const NAMESPACE: &str = "system_logs";

#[derive(Debug, Default, Clone)]
pub struct LogFilter {
    pub level: Option<LogLevel>,
    pub monitor_id: Option<String>,
    pub text_contains: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct LogPage {
    pub entries: Vec<SystemLog>,
    /// Exact only within the scan window (§4.3); otherwise a lower bound.
    pub matched_count_within_scan: usize,
}

impl Kv {
    pub async fn append_system_log(&self, log: &SystemLog) {
        let key = join_key(&[NAMESPACE, &time_key(log.timestamp), &log.id]);
        // Fire-and-forget: a logging failure must never fail the caller (§4.3).
        match serde_json::to_string(log) {
            Ok(value) => {
                self.set(&key, &value).await;
            }
            Err(e) => error!("failed to serialize system log {}: {}", log.id, e),
        }
    }

    pub async fn list_system_logs(&self, filter: &LogFilter) -> Result<LogPage> {
        let rows = self
            .range(NAMESPACE, true, Some(MAX_SYSTEM_LOGS_SCAN as i64))
            .await?;

        let mut matched = Vec::new();
        for (key, value) in rows {
            let entry: SystemLog = match serde_json::from_str(&value) {
                Ok(e) => e,
                Err(e) => {
                    error!("skipping corrupt system log {}: {}", key, e);
                    continue;
                }
            };
            if !matches_filter(&entry, filter) {
                continue;
            }
            matched.push(entry);
        }

        let matched_count_within_scan = matched.len();
        let page = matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.max(1))
            .collect();

        Ok(LogPage {
            entries: page,
            matched_count_within_scan,
        })
    }

    /// Removes system logs older than 7 days (§4.3, §4.9).
    pub async fn sweep_old_system_logs(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(RETENTION_DAYS);
        let cutoff_key = join_key(&[NAMESPACE, &time_key(cutoff)]);
        let rows = self.range(NAMESPACE, false, None).await?;

        let mut removed = 0u64;
        for (key, _) in rows {
            if key < cutoff_key {
                if self.delete(&key).await {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

fn matches_filter(entry: &SystemLog, filter: &LogFilter) -> bool {
    if let Some(level) = filter.level {
        if entry.level != level {
            return false;
        }
    }
    if let Some(monitor_id) = &filter.monitor_id {
        if entry.monitor_id.as_deref() != Some(monitor_id.as_str()) {
            return false;
        }
    }
    if let Some(needle) = &filter.text_contains {
        if !entry.message.contains(needle.as_str()) {
            return false;
        }
    }
    true
}

pub fn new_log(level: LogLevel, message: impl Into<String>) -> SystemLog {
    SystemLog {
        id: Uuid::new_v4().to_string(),
        level,
        message: message.into(),
        monitor_id: None,
        monitor_name: None,
        metadata: None,
        timestamp: Utc::now(),
    }
}

pub fn new_monitor_log(
    level: LogLevel,
    message: impl Into<String>,
    monitor_id: impl Into<String>,
    monitor_name: impl Into<String>,
) -> SystemLog {
    SystemLog {
        monitor_id: Some(monitor_id.into()),
        monitor_name: Some(monitor_name.into()),
        ..new_log(level, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_returns_newest_first() {
        let kv = Kv::new(":memory:").await.unwrap();
        let mut first = new_log(LogLevel::Info, "first");
        first.timestamp = Utc::now() - Duration::minutes(1);
        let second = new_log(LogLevel::Info, "second");

        kv.append_system_log(&first).await;
        kv.append_system_log(&second).await;

        let page = kv.list_system_logs(&LogFilter { limit: 10, ..Default::default() }).await.unwrap();
        assert_eq!(page.entries[0].message, "second");
        assert_eq!(page.entries[1].message, "first");
    }

    #[tokio::test]
    async fn filter_by_level_excludes_others() {
        let kv = Kv::new(":memory:").await.unwrap();
        kv.append_system_log(&new_log(LogLevel::Info, "info-one")).await;
        kv.append_system_log(&new_log(LogLevel::Error, "error-one")).await;

        let page = kv
            .list_system_logs(&LogFilter {
                level: Some(LogLevel::Error),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].message, "error-one");
    }

    #[tokio::test]
    async fn sweep_removes_only_entries_past_retention() {
        let kv = Kv::new(":memory:").await.unwrap();
        let mut old = new_log(LogLevel::Info, "old");
        old.timestamp = Utc::now() - Duration::days(10);
        let fresh = new_log(LogLevel::Info, "fresh");

        kv.append_system_log(&old).await;
        kv.append_system_log(&fresh).await;

        let removed = kv.sweep_old_system_logs().await.unwrap();
        assert_eq!(removed, 1);

        let page = kv.list_system_logs(&LogFilter { limit: 10, ..Default::default() }).await.unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].message, "fresh");
    }
}
