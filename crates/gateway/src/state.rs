use std::sync::Arc;

use chrono::{DateTime, Utc};

use arcp_auth::{RateLimiters, SessionStore, TokenService};
use arcp_domain::config::ArcpConfig;
use arcp_registry::AgentRegistry;
use arcp_storage::StorageAdapter;

/// Shared application state passed to all API handlers.
///
/// Everything is an explicitly constructed service; nothing is process
/// global, so tests can instantiate fresh cores.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcpConfig>,
    pub storage: Arc<StorageAdapter>,
    pub registry: Arc<AgentRegistry>,
    pub tokens: Arc<TokenService>,
    pub sessions: Arc<SessionStore>,
    pub limiters: Arc<RateLimiters>,
    /// `sha256` of each configured registration key (computed once at
    /// startup; raw keys are never held past construction).
    pub agent_key_hashes: Arc<Vec<String>>,
    /// Outbound client for `/public/connect/{id}` forwarding.
    pub http: reqwest::Client,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
