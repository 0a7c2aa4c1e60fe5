use serde::{Deserialize, Serialize};

use super::{env_list, env_parse, env_str};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Authentication
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// `JWT_SECRET` — HS256 signing secret. Required, no default.
    #[serde(default)]
    pub jwt_secret: String,
    /// `JWT_ALGORITHM` — only HS256 is supported.
    #[serde(default = "d_algorithm")]
    pub jwt_algorithm: String,
    /// `JWT_EXPIRE_MINUTES` — standard token TTL.
    #[serde(default = "d_expire_minutes")]
    pub jwt_expire_minutes: u64,
    /// `ADMIN_USERNAME` — required, no default.
    #[serde(default)]
    pub admin_username: String,
    /// `ADMIN_PASSWORD` — required, no default.
    #[serde(default)]
    pub admin_password: String,
    /// `ADMIN_PIN_MIN_LEN`
    #[serde(default = "d_pin_min_len")]
    pub pin_min_len: usize,
    /// `AGENT_KEYS` — comma-separated registration key allow-list.
    /// Keys are compared against the hash presented at enrollment.
    #[serde(default)]
    pub agent_keys: Vec<String>,
    /// `SESSION_TIMEOUT` — admin session TTL in minutes.
    #[serde(default = "d_session_timeout")]
    pub session_timeout_minutes: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_algorithm: d_algorithm(),
            jwt_expire_minutes: d_expire_minutes(),
            admin_username: String::new(),
            admin_password: String::new(),
            pin_min_len: d_pin_min_len(),
            agent_keys: Vec::new(),
            session_timeout_minutes: d_session_timeout(),
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self {
            jwt_secret: env_str("JWT_SECRET").unwrap_or_default(),
            jwt_algorithm: env_str("JWT_ALGORITHM").unwrap_or_else(d_algorithm),
            jwt_expire_minutes: env_parse("JWT_EXPIRE_MINUTES", d_expire_minutes()),
            admin_username: env_str("ADMIN_USERNAME").unwrap_or_default(),
            admin_password: env_str("ADMIN_PASSWORD").unwrap_or_default(),
            pin_min_len: env_parse("ADMIN_PIN_MIN_LEN", d_pin_min_len()),
            agent_keys: env_list("AGENT_KEYS"),
            session_timeout_minutes: env_parse("SESSION_TIMEOUT", d_session_timeout()),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_algorithm() -> String {
    "HS256".into()
}
fn d_expire_minutes() -> u64 {
    60
}
fn d_pin_min_len() -> usize {
    4
}
fn d_session_timeout() -> u64 {
    30
}
