//! Environment-derived runtime settings.
//!
//! Loaded once in `main` and shared as an `Arc<Settings>`. Every field has a documented
//! default so a bare `sitewatch` invocation with no environment is a valid configuration.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Settings {
    pub admin_password: String,
    pub session_expire_hours: i64,
    pub default_monitor_interval: i64,
    pub min_monitor_interval: i64,
    pub max_monitor_interval: i64,
    pub history_retention_days: i64,
    pub max_concurrent_monitors: usize,
    pub request_timeout: Duration,
    pub login_lockout_minutes: i64,
    pub max_login_attempts: u32,
    pub log_level: String,
    pub port: u16,
    pub database_path: String,
    pub maintenance_interval_hours: i64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            admin_password: env_string("ADMIN_PASSWORD", "admin123"),
            session_expire_hours: env_parsed("SESSION_EXPIRE_HOURS", 24)?,
            default_monitor_interval: env_parsed("DEFAULT_MONITOR_INTERVAL", 1)?,
            min_monitor_interval: env_parsed("MIN_MONITOR_INTERVAL", 1)?,
            max_monitor_interval: env_parsed("MAX_MONITOR_INTERVAL", 60)?,
            history_retention_days: env_parsed("HISTORY_RETENTION_DAYS", 30)?,
            max_concurrent_monitors: env_parsed("MAX_CONCURRENT_MONITORS", 10)?,
            request_timeout: Duration::from_millis(env_parsed("REQUEST_TIMEOUT", 30_000)?),
            login_lockout_minutes: env_parsed("LOGIN_LOCKOUT_MINUTES", 15)?,
            max_login_attempts: env_parsed("MAX_LOGIN_ATTEMPTS", 5)?,
            log_level: env_string("LOG_LEVEL", "info"),
            port: env_parsed("PORT", 8000)?,
            database_path: env_string("DATABASE_PATH", crate::constants::DEFAULT_DATABASE_PATH),
            maintenance_interval_hours: env_parsed("MAINTENANCE_INTERVAL_HOURS", 1)?,
        })
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}"))
            .with_context(|| format!("parsing environment variable {key}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_default_applies_when_unset() {
        assert_eq!(env_string("__SITEWATCH_UNSET_VAR__", "admin123"), "admin123");
    }

    #[test]
    fn parsed_default_applies_when_unset() {
        let value: i64 = env_parsed("__SITEWATCH_UNSET_VAR__", 30).unwrap();
        assert_eq!(value, 30);
    }
}
