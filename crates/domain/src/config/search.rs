use serde::{Deserialize, Serialize};

use super::env_parse;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Semantic search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// `VECTOR_SEARCH_TOP_K` — default result count.
    #[serde(default = "d_top_k")]
    pub top_k: usize,
    /// Hard ceiling on requested `top_k`.
    #[serde(default = "d_max_top_k")]
    pub max_top_k: usize,
    /// `VECTOR_SEARCH_MIN_SIMILARITY` — default similarity floor.
    #[serde(default = "d_min_similarity")]
    pub min_similarity: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: d_top_k(),
            max_top_k: d_max_top_k(),
            min_similarity: d_min_similarity(),
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        Self {
            top_k: env_parse("VECTOR_SEARCH_TOP_K", d_top_k()),
            max_top_k: d_max_top_k(),
            min_similarity: env_parse("VECTOR_SEARCH_MIN_SIMILARITY", d_min_similarity()),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_top_k() -> usize {
    10
}
fn d_max_top_k() -> usize {
    100
}
fn d_min_similarity() -> f32 {
    0.5
}
