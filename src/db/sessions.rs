//! `(sessions, <token>)` — point lookup (§6).

use chrono::{DateTime, Duration, Utc};
use tracing::error;
use uuid::Uuid;

use crate::model::Session;

use super::{join_key, Kv};

const NAMESPACE: &str = "sessions";

impl Kv {
    pub async fn get_session(&self, token: &str) -> Option<Session> {
        let raw = self.get(&join_key(&[NAMESPACE, token])).await?;
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => {
                if session.expires_at > Utc::now() {
                    Some(session)
                } else {
                    // Expired sessions must never be observable by the auth check (§3).
                    self.delete(&join_key(&[NAMESPACE, token])).await;
                    None
                }
            }
            Err(e) => {
                error!("corrupt session record {}: {}", token, e);
                None
            }
        }
    }

    pub async fn put_session(&self, session: &Session) -> bool {
        let key = join_key(&[NAMESPACE, &session.id]);
        match serde_json::to_string(session) {
            Ok(value) => self.set(&key, &value).await,
            Err(e) => {
                error!("failed to serialize session {}: {}", session.id, e);
                false
            }
        }
    }

    pub async fn delete_session(&self, token: &str) -> bool {
        self.delete(&join_key(&[NAMESPACE, token])).await
    }

    /// Touches `last_access_at`; races with a concurrent delete benignly resolve to a no-op
    /// (§5: "a delete that observes no session is a no-op").
    pub async fn touch_session(&self, token: &str) {
        if let Some(mut session) = self.get_session(token).await {
            session.last_access_at = Utc::now();
            self.put_session(&session).await;
        }
    }

    /// Deletes every session whose `expires_at` has passed. Used by the maintenance job.
    pub async fn sweep_expired_sessions(&self) -> anyhow::Result<u64> {
        let rows = self.range(NAMESPACE, false, None).await?;
        let now = Utc::now();
        let mut removed = 0u64;
        for (key, value) in rows {
            match serde_json::from_str::<Session>(&value) {
                Ok(session) if session.expires_at < now => {
                    if self.delete(&key).await {
                        removed += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => error!("skipping corrupt session record {}: {}", key, e),
            }
        }
        Ok(removed)
    }
}

pub fn new_session(ip_address: String, user_agent: String, expire_hours: i64) -> Session {
    let now = Utc::now();
    Session {
        id: Uuid::new_v4().to_string(),
        authenticated: true,
        created_at: now,
        expires_at: now + Duration::hours(expire_hours),
        last_access_at: now,
        ip_address,
        user_agent,
    }
}

/// Cookie metadata for `Set-Cookie: session=<token>; ...` per §6.
pub fn cookie_max_age_seconds(expire_hours: i64) -> i64 {
    expire_hours * 3600
}
