//! `(login_attempts, <ip>, <id>)` — range scan per IP (§6).

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::error;
use uuid::Uuid;

use crate::constants::auth::LOGIN_ATTEMPT_RETENTION_HOURS;
use crate::model::LoginAttempt;

use super::{join_key, subtree_prefix, time_key, Kv};

const NAMESPACE: &str = "login_attempts";

impl Kv {
    pub async fn record_login_attempt(&self, ip: &str, success: bool) -> bool {
        let attempt = LoginAttempt {
            id: Uuid::new_v4().to_string(),
            ip: ip.to_string(),
            timestamp: Utc::now(),
            success,
        };
        let key = join_key(&[NAMESPACE, ip, &format!("{}_{}", time_key(attempt.timestamp), attempt.id)]);
        match serde_json::to_string(&attempt) {
            Ok(value) => self.set(&key, &value).await,
            Err(e) => {
                error!("failed to serialize login attempt: {}", e);
                false
            }
        }
    }

    /// Count of failed attempts from `ip` within the trailing `lockout_minutes` (§4.6).
    pub async fn recent_failed_attempts(&self, ip: &str, lockout_minutes: i64) -> Result<usize> {
        let prefix = subtree_prefix(&[NAMESPACE, ip]);
        let rows = self.range(&prefix, true, None).await?;
        let cutoff = Utc::now() - Duration::minutes(lockout_minutes);

        let mut failures = 0usize;
        for (key, value) in rows {
            match serde_json::from_str::<LoginAttempt>(&value) {
                Ok(attempt) => {
                    if attempt.timestamp < cutoff {
                        break;
                    }
                    if !attempt.success {
                        failures += 1;
                    }
                }
                Err(e) => error!("skipping corrupt login attempt {}: {}", key, e),
            }
        }
        Ok(failures)
    }

    /// Removes login-attempt records older than 24h (§4.6).
    pub async fn sweep_old_login_attempts(&self) -> Result<u64> {
        let rows = self.range(NAMESPACE, false, None).await?;
        let cutoff = Utc::now() - Duration::hours(LOGIN_ATTEMPT_RETENTION_HOURS);
        let mut removed = 0u64;
        for (key, value) in rows {
            match serde_json::from_str::<LoginAttempt>(&value) {
                Ok(attempt) if attempt.timestamp < cutoff => {
                    if self.delete(&key).await {
                        removed += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => error!("skipping corrupt login attempt {}: {}", key, e),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_only_failures_within_the_lockout_window() {
        let kv = Kv::new(":memory:").await.unwrap();
        for _ in 0..5 {
            kv.record_login_attempt("1.2.3.4", false).await;
        }
        kv.record_login_attempt("1.2.3.4", true).await;

        let failures = kv.recent_failed_attempts("1.2.3.4", 15).await.unwrap();
        assert_eq!(failures, 5);
    }

    #[tokio::test]
    async fn different_ips_are_isolated() {
        let kv = Kv::new(":memory:").await.unwrap();
        kv.record_login_attempt("1.1.1.1", false).await;
        kv.record_login_attempt("2.2.2.2", false).await;

        assert_eq!(kv.recent_failed_attempts("1.1.1.1", 15).await.unwrap(), 1);
        assert_eq!(kv.recent_failed_attempts("3.3.3.3", 15).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn an_ip_that_extends_another_ip_is_not_counted_against_it() {
        let kv = Kv::new(":memory:").await.unwrap();
        for _ in 0..5 {
            kv.record_login_attempt("1.2.3.45", false).await;
        }

        assert_eq!(kv.recent_failed_attempts("1.2.3.4", 15).await.unwrap(), 0);
        assert_eq!(kv.recent_failed_attempts("1.2.3.45", 15).await.unwrap(), 5);
    }
}
