//! Semantic search over registered agents.
//!
//! Vector mode embeds the query and ranks candidates by cosine similarity
//! against their stored embeddings. When no provider is available or no
//! embeddings exist, a deterministic lexical mode ranks by token overlap.
//! Both modes: filter → score → `min_similarity` floor → sort descending →
//! `top_k`, with ties broken by `agent_id` ascending for reproducibility.
//!
//! Weighting (when `weighted` is set): the `min_similarity` floor applies
//! to the **raw** score; retained candidates are then re-scored
//! `raw · (0.3 + 0.7 · reputation/5)`, which is monotone in both the raw
//! similarity and the reputation. Agents without metrics keep their raw
//! score.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::Utc;

use arcp_domain::config::SearchConfig;
use arcp_domain::error::{Error, Result};
use arcp_protocol::{AgentInfo, AgentStatus, ListFilter, SearchRequest};

use crate::registry::AgentRegistry;

/// Weighted re-score floor: a zero-reputation agent keeps 30% of its raw
/// similarity instead of vanishing.
const WEIGHT_FLOOR: f32 = 0.3;

impl AgentRegistry {
    /// Run a search against a consistent snapshot of agents and embeddings.
    /// Never blocks registry writes.
    pub async fn search(
        &self,
        req: &SearchRequest,
        defaults: &SearchConfig,
    ) -> Result<Vec<AgentInfo>> {
        if req.query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        let top_k = req.top_k.unwrap_or(defaults.top_k);
        if top_k == 0 || top_k > defaults.max_top_k {
            return Err(Error::Validation(format!(
                "top_k must be within 1..={}",
                defaults.max_top_k
            )));
        }
        let min_similarity = req.min_similarity.unwrap_or(defaults.min_similarity);
        if !(0.0..=1.0).contains(&min_similarity) {
            return Err(Error::Validation(
                "min_similarity must be within [0, 1]".into(),
            ));
        }

        // Filter over alive agents from a snapshot.
        let filter = ListFilter {
            agent_type: req.agent_type.clone(),
            status: Some(AgentStatus::Alive),
            capabilities: req.capabilities.clone(),
        };
        let now = Utc::now();
        let candidates: Vec<AgentInfo> = {
            let state = self.state.read();
            state
                .agents
                .values()
                .cloned()
                .collect::<Vec<_>>()
        }
        .into_iter()
        .map(|record| self.finalize(record, now))
        .filter(|agent| filter.matches(agent))
        .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let have_embeddings = !self.state.read().embeddings.is_empty();
        let mut scored = if self.embeddings.is_available() && have_embeddings {
            match self.embeddings.embed(&req.query).await {
                Ok(query_vector) => self.score_vector(&candidates, &query_vector),
                Err(e) => {
                    tracing::warn!(error = %e, "query embedding failed, using lexical fallback");
                    score_lexical(&candidates, &req.query)
                }
            }
        } else {
            score_lexical(&candidates, &req.query)
        };

        // Raw-score floor, then optional reputation weighting.
        scored.retain(|(_, raw)| *raw >= min_similarity);
        if req.weighted {
            for (agent, score) in &mut scored {
                if let Some(metrics) = &agent.metrics {
                    let reputation = (metrics.reputation_score / 5.0) as f32;
                    *score *= WEIGHT_FLOOR + (1.0 - WEIGHT_FLOOR) * reputation;
                }
            }
        }

        scored.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(mut agent, score)| {
                agent.similarity = Some(score);
                agent
            })
            .collect())
    }

    fn score_vector(
        &self,
        candidates: &[AgentInfo],
        query_vector: &[f32],
    ) -> Vec<(AgentInfo, f32)> {
        let state = self.state.read();
        candidates
            .iter()
            .filter_map(|agent| {
                let stored = state.embeddings.get(&agent.agent_id)?;
                Some((agent.clone(), cosine_similarity(query_vector, stored)))
            })
            .collect()
    }
}

/// Cosine similarity clamped into [0, 1] (negative similarity is treated as
/// unrelated).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Deterministic lexical fallback: weighted token overlap over `name`
/// (×3), `context_brief` (×2) and `capabilities` (×1), normalized into
/// [0, 1].
fn score_lexical(candidates: &[AgentInfo], query: &str) -> Vec<(AgentInfo, f32)> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return Vec::new();
    }
    let max_score = (query_tokens.len() * 6) as f32;

    candidates
        .iter()
        .map(|agent| {
            let name_tokens = tokenize(&agent.name);
            let brief_tokens = tokenize(&agent.context_brief);
            let cap_tokens: HashSet<String> = agent
                .capabilities
                .iter()
                .flat_map(|c| tokenize(c))
                .collect();

            let mut score = 0usize;
            for token in &query_tokens {
                if name_tokens.contains(token) {
                    score += 3;
                }
                if brief_tokens.contains(token) {
                    score += 2;
                }
                if cap_tokens.contains(token) {
                    score += 1;
                }
            }
            (agent.clone(), score as f32 / max_score)
        })
        .collect()
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.1, 0.2, 0.3];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_clamps_negative_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn tokenizer_splits_on_non_alphanumerics() {
        let tokens = tokenize("Vulnerability-Scanning, v2!");
        assert!(tokens.contains("vulnerability"));
        assert!(tokens.contains("scanning"));
        assert!(tokens.contains("v2"));
        assert_eq!(tokens.len(), 3);
    }
}
