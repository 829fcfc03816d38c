//! `(monitors, <id>)` — point lookup and full range (§6).

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, error};

use crate::model::MonitorConfig;

use super::{join_key, subtree_prefix, Kv};

const NAMESPACE: &str = "monitors";

impl Kv {
    pub async fn get_monitor(&self, id: &str) -> Option<MonitorConfig> {
        let raw = self.get(&join_key(&[NAMESPACE, id])).await?;
        match serde_json::from_str(&raw) {
            Ok(config) => Some(config),
            Err(e) => {
                error!("corrupt monitor record {}: {}", id, e);
                None
            }
        }
    }

    pub async fn list_monitors(&self) -> Result<Vec<MonitorConfig>> {
        let rows = self.range(NAMESPACE, false, None).await?;
        let mut configs = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            match serde_json::from_str::<MonitorConfig>(&value) {
                Ok(config) => configs.push(config),
                Err(e) => error!("skipping corrupt monitor record {}: {}", key, e),
            }
        }
        Ok(configs)
    }

    pub async fn put_monitor(&self, config: &MonitorConfig) -> bool {
        let key = join_key(&[NAMESPACE, &config.id]);
        let value = match serde_json::to_string(config) {
            Ok(v) => v,
            Err(e) => {
                error!("failed to serialize monitor {}: {}", config.id, e);
                return false;
            }
        };
        let ok = self.set(&key, &value).await;
        if ok {
            debug!("stored monitor {}", config.id);
        }
        ok
    }

    /// Deletes the config and every history record under it. Best-effort per §4.1: the
    /// config delete and the history range delete are two separate operations.
    pub async fn delete_monitor_cascade(&self, id: &str) -> Result<bool> {
        let existed = self.delete(&join_key(&[NAMESPACE, id])).await;
        let history_prefix = subtree_prefix(&["history", id]);
        if let Err(e) = self.delete_range(&history_prefix).await {
            error!("cascade history delete for monitor {} failed: {}", id, e);
        }
        Ok(existed)
    }
}

/// Applies `last_check_at`/`status`/`last_error` write-back from a probe outcome
/// without disturbing the rest of the config. Returns the updated config for callers
/// (e.g. the scheduler) that want to log the new state without a second read.
pub fn apply_status_update(
    mut config: MonitorConfig,
    status: crate::model::MonitorStatus,
    last_error: Option<String>,
) -> MonitorConfig {
    config.last_check_at = Some(Utc::now());
    config.status = Some(status);
    config.last_error = last_error;
    config.updated_at = Utc::now();
    config
}
