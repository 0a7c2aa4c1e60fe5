use serde::{Deserialize, Serialize};

use super::{env_bool, env_list, env_parse, env_str};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `ARCP_HOST`
    #[serde(default = "d_host")]
    pub host: String,
    /// `ARCP_PORT`
    #[serde(default = "d_port")]
    pub port: u16,
    /// `ARCP_DEBUG`
    #[serde(default)]
    pub debug: bool,
    /// `ALLOWED_ORIGINS`. Use `["*"]` for permissive (NOT recommended).
    #[serde(default = "d_cors_origins")]
    pub cors_origins: Vec<String>,
    /// `RATE_LIMIT_ENABLED` — gates both the per-IP token bucket and the
    /// brute-force limiter.
    #[serde(default = "d_true")]
    pub rate_limit_enabled: bool,
    /// `RATE_LIMIT_RPS`
    #[serde(default = "d_rps")]
    pub rate_limit_rps: u64,
    /// `RATE_LIMIT_BURST`
    #[serde(default = "d_burst")]
    pub rate_limit_burst: u32,
    /// `MAX_CONCURRENT_REQUESTS`
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            debug: false,
            cors_origins: d_cors_origins(),
            rate_limit_enabled: true,
            rate_limit_rps: d_rps(),
            rate_limit_burst: d_burst(),
            max_concurrent_requests: d_max_concurrent(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let cors = env_list("ALLOWED_ORIGINS");
        Self {
            host: env_str("ARCP_HOST").unwrap_or_else(d_host),
            port: env_parse("ARCP_PORT", d_port()),
            debug: env_bool("ARCP_DEBUG", false),
            cors_origins: if cors.is_empty() { d_cors_origins() } else { cors },
            rate_limit_enabled: env_bool("RATE_LIMIT_ENABLED", true),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS", d_rps()),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", d_burst()),
            max_concurrent_requests: env_parse("MAX_CONCURRENT_REQUESTS", d_max_concurrent()),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_port() -> u16 {
    8001
}
fn d_cors_origins() -> Vec<String> {
    vec!["*".into()]
}
fn d_true() -> bool {
    true
}
fn d_rps() -> u64 {
    50
}
fn d_burst() -> u32 {
    100
}
fn d_max_concurrent() -> usize {
    256
}
