//! Centralized tunables that are not exposed as environment variables.
//!
//! Values that operators are expected to override live on [`crate::settings::Settings`]
//! instead; this module holds the ones that are implementation detail.

#![allow(dead_code)]

pub mod cache {
    use std::time::Duration;

    pub const ALL_MONITOR_CONFIGS_TTL: Duration = Duration::from_secs(2 * 60);
    pub const MONITOR_HISTORY_TTL: Duration = Duration::from_secs(5 * 60);
    pub const MONITOR_STATS_TTL: Duration = Duration::from_secs(5 * 60);
    pub const SYSTEM_LOGS_TTL: Duration = Duration::from_secs(3 * 60);
    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);
}

pub mod probe {
    use std::time::Duration;

    pub const MAX_RETRIES: u32 = 2;
    pub const RETRY_BACKOFF: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(2)];
    pub const BATCH_PAUSE: Duration = Duration::from_secs(1);
}

pub mod scheduler {
    use std::time::Duration;

    pub const TICK_INTERVAL: Duration = Duration::from_secs(60);
}

pub mod logs {
    pub const MAX_SYSTEM_LOGS_SCAN: usize = 5_000;
    pub const RETENTION_DAYS: i64 = 7;
}

pub mod auth {
    pub const LOGIN_ATTEMPT_RETENTION_HOURS: i64 = 24;
}

pub const CLOUDSTUDIO_HOST_FRAGMENT: &str = "cloudstudio.net";
pub const CLOUDSTUDIO_AFFINITY_FRAGMENTS: [&str; 2] = ["cloudstudio.net", "cloudstudio.club"];

pub const DEFAULT_DATABASE_PATH: &str = "data/monitor.db";
