use serde::{Deserialize, Serialize};

use super::{env_parse, env_str};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `REDIS_URL` (or assembled from `REDIS_HOST`/`REDIS_PORT`/
    /// `REDIS_PASSWORD`). Unset = in-process storage only.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// `REDIS_HEALTH_CHECK_INTERVAL` — seconds the availability probe is
    /// cached for; also the reconnect throttle after a failed probe.
    #[serde(default = "d_health_interval")]
    pub health_check_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            health_check_interval_secs: d_health_interval(),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let redis_url = env_str("REDIS_URL").or_else(|| {
            let host = env_str("REDIS_HOST")?;
            let port = env_parse("REDIS_PORT", 6379u16);
            Some(match env_str("REDIS_PASSWORD") {
                Some(pw) => format!("redis://:{pw}@{host}:{port}"),
                None => format!("redis://{host}:{port}"),
            })
        });
        Self {
            redis_url,
            health_check_interval_secs: env_parse(
                "REDIS_HEALTH_CHECK_INTERVAL",
                d_health_interval(),
            ),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_health_interval() -> u64 {
    30
}
