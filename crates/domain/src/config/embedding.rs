use serde::{Deserialize, Serialize};

use super::{env_parse, env_str};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Embedding provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// `AZURE_OPENAI_ENDPOINT`. Unset = no provider; search falls back to
    /// lexical scoring.
    #[serde(default)]
    pub azure_endpoint: Option<String>,
    /// `AZURE_OPENAI_API_KEY`
    #[serde(default)]
    pub azure_api_key: Option<String>,
    /// `AZURE_OPENAI_DEPLOYMENT`
    #[serde(default = "d_deployment")]
    pub azure_deployment: String,
    /// `AZURE_OPENAI_API_VERSION`
    #[serde(default = "d_api_version")]
    pub azure_api_version: String,
    /// `EMBEDDING_DIMENSIONS`
    #[serde(default = "d_dimensions")]
    pub dimensions: usize,
    /// `EMBEDDING_TIMEOUT_SECONDS` — hard per-call timeout.
    #[serde(default = "d_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            azure_endpoint: None,
            azure_api_key: None,
            azure_deployment: d_deployment(),
            azure_api_version: d_api_version(),
            dimensions: d_dimensions(),
            timeout_secs: d_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        Self {
            azure_endpoint: env_str("AZURE_OPENAI_ENDPOINT"),
            azure_api_key: env_str("AZURE_OPENAI_API_KEY"),
            azure_deployment: env_str("AZURE_OPENAI_DEPLOYMENT").unwrap_or_else(d_deployment),
            azure_api_version: env_str("AZURE_OPENAI_API_VERSION").unwrap_or_else(d_api_version),
            dimensions: env_parse("EMBEDDING_DIMENSIONS", d_dimensions()),
            timeout_secs: env_parse("EMBEDDING_TIMEOUT_SECONDS", d_timeout()),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_deployment() -> String {
    "text-embedding-3-small".into()
}
fn d_api_version() -> String {
    "2024-02-01".into()
}
fn d_dimensions() -> usize {
    1536
}
fn d_timeout() -> u64 {
    10
}
