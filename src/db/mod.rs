//! The ordered key-value store adapter (C1).
//!
//! Keys are tuples of string segments, joined with a separator byte (`\u{1}`) that cannot
//! occur inside a segment (segments are always UUIDs, IP addresses, or zero-padded decimal
//! strings). SQLite's default `TEXT PRIMARY KEY` collation is byte-lexicographic, so the
//! single `kv_entries` table gives us tuple ordering for free and range scans become plain
//! `WHERE k >= ? AND k < ?` queries.

pub mod history;
pub mod login_attempts;
pub mod monitors;
pub mod sessions;
pub mod system_logs;

use anyhow::Result;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use tracing::{error, info};

const SEGMENT_SEPARATOR: char = '\u{1}';

static NEXT_MEMORY_DB_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Joins key segments into the flat string stored as the SQLite primary key.
pub fn join_key(segments: &[&str]) -> String {
    segments.join(&SEGMENT_SEPARATOR.to_string())
}

/// Joins key segments into a prefix that scans only their exact subtree, not any sibling
/// entity whose id happens to extend one of `segments` (e.g. `login_attempts/1.2.3.4` vs.
/// `login_attempts/1.2.3.45` — without the trailing separator the latter's key sorts inside
/// the former's naive prefix range). Use this instead of `join_key` whenever the result feeds
/// `range`/`delete_range` for a scan rooted below a variable-length segment.
pub fn subtree_prefix(segments: &[&str]) -> String {
    format!("{}{}", join_key(segments), SEGMENT_SEPARATOR)
}

/// Left-zero-padded 20-digit millisecond timestamp, per §6's `system_logs` key convention.
/// Sorting lexicographically on this string sorts chronologically.
pub fn time_key(timestamp: chrono::DateTime<chrono::Utc>) -> String {
    format!("{:020}", timestamp.timestamp_millis())
}

/// Computes the exclusive upper bound for a prefix range scan by incrementing the
/// last character's codepoint. Any key starting with `prefix` sorts below this bound.
fn prefix_upper_bound(prefix: &str) -> String {
    let mut chars: Vec<char> = prefix.chars().collect();
    if let Some(last) = chars.pop() {
        let bumped = char::from_u32(last as u32 + 1).unwrap_or(char::MAX);
        chars.push(bumped);
    }
    chars.into_iter().collect()
}

pub struct Kv {
    pool: Pool<Sqlite>,
}

impl Kv {
    pub async fn new(database_path: &str) -> Result<Self> {
        info!("opening KV store at {}", database_path);

        let is_memory = database_path == ":memory:";
        let (url, max_connections) = if is_memory {
            // A plain ":memory:" URL hands every pooled connection its own empty database,
            // which breaks as soon as the pool opens a second connection. Shared cache mode
            // fixes that, but the shared cache is keyed by name process-wide, so two
            // unrelated `Kv::new(":memory:")` calls (e.g. two tests running in parallel)
            // would otherwise see each other's rows unless each instance gets its own name.
            let id = NEXT_MEMORY_DB_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            (format!("sqlite:file:sitewatch-test-{id}?mode=memory&cache=shared"), 1)
        } else {
            if let Some(parent) = std::path::Path::new(database_path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            (format!("sqlite:{}?mode=rwc", database_path), 8)
        };

        let pool = match SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await
        {
            Ok(pool) => pool,
            Err(e) => {
                error!("failed to open KV store: {}", e);
                return Err(e.into());
            }
        };

        let kv = Self { pool };
        kv.initialize_schema().await?;
        info!("KV store ready");
        Ok(kv)
    }

    async fn initialize_schema(&self) -> Result<()> {
        info!("step 1/2: creating kv_entries table");
        if let Err(e) = sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_entries (
                k TEXT PRIMARY KEY,
                v TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        {
            error!("failed to create kv_entries table: {}", e);
            return Err(e.into());
        }

        info!("step 2/2: creating supporting index");
        if let Err(e) = sqlx::query("CREATE INDEX IF NOT EXISTS idx_kv_entries_k ON kv_entries(k)")
            .execute(&self.pool)
            .await
        {
            error!("failed to create kv_entries index: {}", e);
            return Err(e.into());
        }

        Ok(())
    }

    /// Point read. Returns `None` on a missing key or a transient store error (logged, not
    /// propagated) — callers treat both the same way per the adapter contract.
    pub async fn get(&self, key: &str) -> Option<String> {
        match sqlx::query("SELECT v FROM kv_entries WHERE k = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(row)) => row.try_get::<String, _>("v").ok(),
            Ok(None) => None,
            Err(e) => {
                error!("kv get failed for key {}: {}", key, e);
                None
            }
        }
    }

    /// Point write (upsert). Returns whether the write succeeded.
    pub async fn set(&self, key: &str, value: &str) -> bool {
        match sqlx::query(
            "INSERT INTO kv_entries (k, v) VALUES (?1, ?2)
             ON CONFLICT(k) DO UPDATE SET v = excluded.v",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        {
            Ok(_) => true,
            Err(e) => {
                error!("kv set failed for key {}: {}", key, e);
                false
            }
        }
    }

    /// Deletes a key. A missing key is not an error — deletion is idempotent.
    pub async fn delete(&self, key: &str) -> bool {
        match sqlx::query("DELETE FROM kv_entries WHERE k = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!("kv delete failed for key {}: {}", key, e);
                false
            }
        }
    }

    /// Range scan over every key starting with `prefix`, in key order (ascending unless
    /// `reverse`), optionally capped at `limit` rows. Unlike point operations, scan failures
    /// propagate — callers doing cascade deletes or retention sweeps need to know.
    pub async fn range(
        &self,
        prefix: &str,
        reverse: bool,
        limit: Option<i64>,
    ) -> Result<Vec<(String, String)>> {
        let upper = prefix_upper_bound(prefix);
        let order = if reverse { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT k, v FROM kv_entries WHERE k >= ?1 AND k < ?2 ORDER BY k {} LIMIT ?3",
            order
        );
        let limit = limit.unwrap_or(i64::MAX);

        let rows = sqlx::query(&sql)
            .bind(prefix)
            .bind(upper)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row: SqliteRow| {
                let k: String = row.try_get("k").unwrap_or_default();
                let v: String = row.try_get("v").unwrap_or_default();
                (k, v)
            })
            .collect())
    }

    /// Deletes every key under `prefix`. Best-effort: used for cascade deletes and retention
    /// sweeps where a partial failure is tolerated (orphans get swept later).
    pub async fn delete_range(&self, prefix: &str) -> Result<u64> {
        let upper = prefix_upper_bound(prefix);
        let result = sqlx::query("DELETE FROM kv_entries WHERE k >= ?1 AND k < ?2")
            .bind(prefix)
            .bind(upper)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_kv() -> Kv {
        Kv::new(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let kv = test_kv().await;
        assert!(kv.set("a", "1").await);
        assert_eq!(kv.get("a").await, Some("1".to_string()));
    }

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let kv = test_kv().await;
        assert_eq!(kv.get("missing").await, None);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let kv = test_kv().await;
        kv.set("a", "1").await;
        assert!(kv.delete("a").await);
        assert!(kv.delete("a").await);
        assert_eq!(kv.get("a").await, None);
    }

    #[tokio::test]
    async fn range_scan_respects_prefix_and_order() {
        let kv = test_kv().await;
        let prefix = join_key(&["history", "m1"]);
        for id in ["001", "002", "003"] {
            kv.set(&join_key(&["history", "m1", id]), id).await;
        }
        kv.set(&join_key(&["history", "m2", "001"]), "other").await;

        let ascending = kv.range(&prefix, false, None).await.unwrap();
        assert_eq!(ascending.len(), 3);
        assert_eq!(ascending[0].1, "001");
        assert_eq!(ascending[2].1, "003");

        let descending = kv.range(&prefix, true, None).await.unwrap();
        assert_eq!(descending[0].1, "003");

        let limited = kv.range(&prefix, false, Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn delete_range_removes_only_the_prefix() {
        let kv = test_kv().await;
        kv.set(&join_key(&["history", "m1", "001"]), "x").await;
        kv.set(&join_key(&["history", "m2", "001"]), "y").await;

        let removed = kv.delete_range(&join_key(&["history", "m1"])).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(kv.get(&join_key(&["history", "m2", "001"])).await, Some("y".to_string()));
    }

    #[tokio::test]
    async fn subtree_prefix_excludes_a_sibling_id_that_extends_this_one() {
        let kv = test_kv().await;
        kv.set(&join_key(&["login_attempts", "1.2.3.4", "a"]), "x").await;
        kv.set(&join_key(&["login_attempts", "1.2.3.45", "b"]), "y").await;

        let scoped = kv
            .range(&subtree_prefix(&["login_attempts", "1.2.3.4"]), false, None)
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].1, "x");
    }
}
