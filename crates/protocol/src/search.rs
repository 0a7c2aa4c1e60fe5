//! Semantic search request/response shapes.

use serde::{Deserialize, Serialize};

use crate::agent::{AgentInfo, PublicAgentInfo};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Non-empty query text.
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_similarity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    /// Weight similarity by agent reputation.
    #[serde(default)]
    pub weighted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<AgentInfo>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSearchResponse {
    pub results: Vec<PublicAgentInfo>,
    pub count: usize,
}
