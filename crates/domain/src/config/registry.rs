use serde::{Deserialize, Serialize};

use super::{env_list, env_parse};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry & lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Floor applied to both lifecycle intervals; values below are clamped.
const MIN_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// `AGENT_HEARTBEAT_TIMEOUT` — seconds without a heartbeat before an
    /// agent is considered dead.
    #[serde(default = "d_heartbeat")]
    pub heartbeat_timeout_secs: u64,
    /// `AGENT_CLEANUP_INTERVAL` — seconds between stale-agent sweeps.
    #[serde(default = "d_cleanup")]
    pub cleanup_interval_secs: u64,
    /// `ALLOWED_AGENT_TYPES`
    #[serde(default = "d_agent_types")]
    pub allowed_agent_types: Vec<String>,
    /// `WEBSOCKET_TIMEOUT` — public WS idle timeout, seconds.
    #[serde(default = "d_ws_timeout")]
    pub websocket_timeout_secs: u64,
    /// `WEBSOCKET_INTERVAL` — public WS stats push interval, seconds.
    #[serde(default = "d_ws_interval")]
    pub websocket_interval_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: d_heartbeat(),
            cleanup_interval_secs: d_cleanup(),
            allowed_agent_types: d_agent_types(),
            websocket_timeout_secs: d_ws_timeout(),
            websocket_interval_secs: d_ws_interval(),
        }
    }
}

impl RegistryConfig {
    pub fn from_env() -> Self {
        let types = env_list("ALLOWED_AGENT_TYPES");
        Self {
            heartbeat_timeout_secs: env_parse("AGENT_HEARTBEAT_TIMEOUT", d_heartbeat()),
            cleanup_interval_secs: env_parse("AGENT_CLEANUP_INTERVAL", d_cleanup()),
            allowed_agent_types: if types.is_empty() { d_agent_types() } else { types },
            websocket_timeout_secs: env_parse("WEBSOCKET_TIMEOUT", d_ws_timeout()),
            websocket_interval_secs: env_parse("WEBSOCKET_INTERVAL", d_ws_interval()),
        }
    }

    /// Copy with sub-minimum intervals raised to the floor.
    pub fn clamped(&self) -> Self {
        let mut c = self.clone();
        c.heartbeat_timeout_secs = c.heartbeat_timeout_secs.max(MIN_INTERVAL_SECS);
        c.cleanup_interval_secs = c.cleanup_interval_secs.max(MIN_INTERVAL_SECS);
        c
    }

    /// Seconds after which the cleanup sweep removes an agent: at least the
    /// floor, at least twice the heartbeat timeout.
    pub fn stale_threshold_secs(&self) -> u64 {
        let c = self.clamped();
        (2 * c.heartbeat_timeout_secs).max(MIN_INTERVAL_SECS)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_heartbeat() -> u64 {
    60
}
fn d_cleanup() -> u64 {
    60
}
fn d_agent_types() -> Vec<String> {
    ["security", "monitoring", "automation", "networking", "testing"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn d_ws_timeout() -> u64 {
    300
}
fn d_ws_interval() -> u64 {
    30
}
