//! `(history, <monitor_id>, <record_id>)` — range scan per monitor (§6).
//!
//! The spec's key tuple has room for only one segment after `monitor_id`, but the stats
//! engine (C7) and history listing both need newest-first order without a secondary index.
//! `record_id` is therefore a composite `<time_key>_<uuid>` (the same zero-padded
//! millisecond `time_key` used verbatim for system logs in §6), so that plain key order is
//! chronological order; `MonitorHistory::id` itself stays a bare UUID, matching §3.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::error;
use uuid::Uuid;

use crate::model::MonitorHistory;

use super::{join_key, subtree_prefix, time_key, Kv};

const NAMESPACE: &str = "history";

fn record_key(monitor_id: &str, timestamp: DateTime<Utc>, id: &str) -> String {
    join_key(&[NAMESPACE, monitor_id, &format!("{}_{}", time_key(timestamp), id)])
}

impl Kv {
    pub async fn append_history(&self, record: &MonitorHistory) -> bool {
        let key = record_key(&record.monitor_id, record.timestamp, &record.id);
        let value = match serde_json::to_string(record) {
            Ok(v) => v,
            Err(e) => {
                error!("failed to serialize history record {}: {}", record.id, e);
                return false;
            }
        };
        self.set(&key, &value).await
    }

    /// Most recent `limit` records for a monitor, newest-first.
    pub async fn recent_history(&self, monitor_id: &str, limit: i64) -> Result<Vec<MonitorHistory>> {
        let prefix = subtree_prefix(&[NAMESPACE, monitor_id]);
        let rows = self.range(&prefix, true, Some(limit)).await?;
        Ok(decode_rows(rows))
    }

    /// Every history record for a monitor newer than `since`, newest-first, used by the
    /// stats engine which stops scanning once it walks past its window.
    pub async fn history_since(&self, monitor_id: &str, since: DateTime<Utc>) -> Result<Vec<MonitorHistory>> {
        let prefix = subtree_prefix(&[NAMESPACE, monitor_id]);
        let rows = self.range(&prefix, true, None).await?;
        let mut out = Vec::new();
        for record in decode_rows(rows) {
            if record.timestamp < since {
                break;
            }
            out.push(record);
        }
        Ok(out)
    }
}

fn decode_rows(rows: Vec<(String, String)>) -> Vec<MonitorHistory> {
    rows.into_iter()
        .filter_map(|(key, value)| match serde_json::from_str(&value) {
            Ok(record) => Some(record),
            Err(e) => {
                error!("skipping corrupt history record {}: {}", key, e);
                None
            }
        })
        .collect()
}

pub fn new_record(
    monitor_id: &str,
    status: crate::model::HistoryStatus,
    response_time_ms: Option<i64>,
    http_status: Option<u16>,
    error: Option<String>,
) -> MonitorHistory {
    MonitorHistory {
        id: Uuid::new_v4().to_string(),
        monitor_id: monitor_id.to_string(),
        timestamp: Utc::now(),
        status,
        response_time_ms,
        http_status,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HistoryStatus;
    use chrono::Duration;

    #[tokio::test]
    async fn append_then_recent_returns_newest_first() {
        let kv = Kv::new(":memory:").await.unwrap();
        let mut r1 = new_record("m1", HistoryStatus::Success, Some(100), Some(200), None);
        r1.timestamp = Utc::now() - Duration::minutes(5);
        let mut r2 = new_record("m1", HistoryStatus::Success, Some(80), Some(200), None);
        r2.timestamp = Utc::now();

        kv.append_history(&r1).await;
        kv.append_history(&r2).await;

        let recent = kv.recent_history("m1", 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, r2.id);
        assert_eq!(recent[1].id, r1.id);
    }

    #[tokio::test]
    async fn history_since_stops_at_window_boundary() {
        let kv = Kv::new(":memory:").await.unwrap();
        let mut old = new_record("m1", HistoryStatus::Success, Some(1), Some(200), None);
        old.timestamp = Utc::now() - Duration::hours(2);
        let mut recent = new_record("m1", HistoryStatus::Success, Some(1), Some(200), None);
        recent.timestamp = Utc::now();

        kv.append_history(&old).await;
        kv.append_history(&recent).await;

        let within = kv
            .history_since("m1", Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(within.len(), 1);
        assert_eq!(within[0].id, recent.id);
    }
}
