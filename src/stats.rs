//! Bucketed aggregation of history (C7).

use chrono::{DateTime, Datelike, Duration, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Kv;
use crate::model::HistoryStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
}

impl Period {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "24h" => Some(Period::Day),
            "7d" => Some(Period::Week),
            _ => None,
        }
    }

    fn bucket_count(&self) -> usize {
        match self {
            Period::Day => 24,
            Period::Week => 7,
        }
    }

    fn window(&self) -> Duration {
        match self {
            Period::Day => Duration::hours(24),
            Period::Week => Duration::days(7),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatBucket {
    pub label: String,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate: f64,
    pub bucket_start: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorStats {
    pub monitor_id: String,
    pub monitor_name: String,
    pub period: String,
    pub buckets: Vec<StatBucket>,
}

/// Computes the aligned bucket boundaries for `period` ending "now" (§4.7), oldest to
/// newest, in the server's local timezone.
fn bucket_starts(period: Period, now: DateTime<Local>) -> Vec<DateTime<Local>> {
    let count = period.bucket_count();
    let mut starts = Vec::with_capacity(count);
    match period {
        Period::Day => {
            let current_hour = now
                .with_minute(0)
                .unwrap()
                .with_second(0)
                .unwrap()
                .with_nanosecond(0)
                .unwrap();
            for i in (0..count).rev() {
                starts.push(current_hour - Duration::hours(i as i64));
            }
        }
        Period::Week => {
            let midnight = now
                .with_hour(0)
                .unwrap()
                .with_minute(0)
                .unwrap()
                .with_second(0)
                .unwrap()
                .with_nanosecond(0)
                .unwrap();
            for i in (0..count).rev() {
                starts.push(midnight - Duration::days(i as i64));
            }
        }
    }
    starts
}

fn bucket_label(period: Period, start: DateTime<Local>) -> String {
    match period {
        Period::Day => format!("{:02}:00", start.hour()),
        Period::Week => format!("{}/{}", start.month(), start.day()),
    }
}

pub async fn compute_stats(
    kv: &Kv,
    monitor_id: &str,
    monitor_name: &str,
    period: Period,
) -> anyhow::Result<MonitorStats> {
    let now_local = Local::now();
    let starts = bucket_starts(period, now_local);
    let bucket_span = match period {
        Period::Day => Duration::hours(1),
        Period::Week => Duration::days(1),
    };

    let since = Utc::now() - period.window();
    let records = kv.history_since(monitor_id, since).await?;

    let mut buckets: Vec<StatBucket> = starts
        .iter()
        .map(|start| StatBucket {
            label: bucket_label(period, *start),
            success_count: 0,
            failure_count: 0,
            success_rate: 0.0,
            bucket_start: start.with_timezone(&Utc),
        })
        .collect();

    for record in &records {
        let local_ts = record.timestamp.with_timezone(&Local);
        if let Some(index) = starts.iter().position(|start| {
            local_ts >= *start && local_ts < *start + bucket_span
        }) {
            match record.status {
                HistoryStatus::Success => buckets[index].success_count += 1,
                HistoryStatus::Error => buckets[index].failure_count += 1,
            }
        }
    }

    for bucket in &mut buckets {
        let total = bucket.success_count + bucket.failure_count;
        bucket.success_rate = if total == 0 {
            0.0
        } else {
            let raw = bucket.success_count as f64 / total as f64 * 100.0;
            (raw * 100.0).round() / 100.0
        };
    }

    Ok(MonitorStats {
        monitor_id: monitor_id.to_string(),
        monitor_name: monitor_name.to_string(),
        period: if period == Period::Day { "24h".to_string() } else { "7d".to_string() },
        buckets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::history::new_record;

    #[tokio::test]
    async fn empty_history_yields_zeroed_buckets() {
        let kv = Kv::new(":memory:").await.unwrap();
        let stats = compute_stats(&kv, "m1", "site", Period::Day).await.unwrap();
        assert_eq!(stats.buckets.len(), 24);
        assert!(stats.buckets.iter().all(|b| b.success_rate == 0.0));
    }

    #[tokio::test]
    async fn success_rate_reflects_mixed_outcomes() {
        let kv = Kv::new(":memory:").await.unwrap();
        kv.append_history(&new_record("m1", HistoryStatus::Success, Some(100), Some(200), None))
            .await;
        kv.append_history(&new_record("m1", HistoryStatus::Error, Some(100), Some(500), Some("x".into())))
            .await;

        let stats = compute_stats(&kv, "m1", "site", Period::Day).await.unwrap();
        let total_success: u64 = stats.buckets.iter().map(|b| b.success_count).sum();
        let total_failure: u64 = stats.buckets.iter().map(|b| b.failure_count).sum();
        assert_eq!(total_success, 1);
        assert_eq!(total_failure, 1);
    }

    #[test]
    fn week_buckets_are_aligned_to_local_midnight() {
        let now = Local::now();
        let starts = bucket_starts(Period::Week, now);
        assert_eq!(starts.len(), 7);
        for start in &starts {
            assert_eq!(start.hour(), 0);
            assert_eq!(start.minute(), 0);
        }
    }
}
