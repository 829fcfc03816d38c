//! The in-process TTL cache (C2), used to coalesce hot reads.
//!
//! Shaped after the teacher's `MaintenanceTracker`/`SimpleOperationTracker`: an
//! `Arc<RwLock<HashMap<..>>>` with a `retain`-based cleanup sweep, cheaply `Clone`-able
//! because cloning shares the same `Arc`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

struct Entry {
    value: Value,
    expires_at: Instant,
}

pub struct Cache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        entries.get(key).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    pub async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Drops every entry whose key starts with `prefix`. Used for cache invalidation on
    /// MonitorConfig mutation (§4.2).
    pub async fn clear_by_prefix(&self, prefix: &str) {
        self.entries.write().await.retain(|key, _| !key.starts_with(prefix));
    }

    /// Evicts expired entries. Run on a `CACHE_CLEANUP` interval by the background sweeper.
    pub async fn cleanup(&self) -> usize {
        let mut entries = self.entries.write().await;
        let initial = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        let evicted = initial - entries.len();
        if evicted > 0 {
            debug!("cache cleanup evicted {} expired entries", evicted);
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Cache {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}
