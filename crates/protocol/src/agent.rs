//! Agent registration and discovery schemas.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arcp_domain::error::{Error, Result};

/// Minimum accepted `public_key` length. Anything shorter is not a plausible
/// key and is rejected at validation time.
pub const MIN_PUBLIC_KEY_LEN: usize = 32;

/// How an agent expects to be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationMode {
    Remote,
    Local,
    Hybrid,
}

/// Computed liveness state. Never stored as ground truth; derived from
/// `last_seen` against the heartbeat timeout at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Alive,
    Dead,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registration (input)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub agent_id: String,
    pub name: String,
    pub agent_type: String,
    /// Agent-side endpoint URL; must be http(s).
    pub endpoint: String,
    /// Free-text description used for semantic indexing.
    pub context_brief: String,
    /// Non-empty set of capability tags.
    pub capabilities: Vec<String>,
    pub owner: String,
    pub public_key: String,
    pub version: String,
    pub communication_mode: CommunicationMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub language_support: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentRegistration {
    /// Structural validation, independent of registry state.
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(Error::Validation("agent_id must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".into()));
        }
        if self.agent_type.trim().is_empty() {
            return Err(Error::Validation("agent_type must not be empty".into()));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(Error::Validation(
                "endpoint must be an http(s) URL".into(),
            ));
        }
        if self.capabilities.is_empty()
            || self.capabilities.iter().any(|c| c.trim().is_empty())
        {
            return Err(Error::Validation(
                "capabilities must be a non-empty list of non-empty tags".into(),
            ));
        }
        if self.public_key.len() < MIN_PUBLIC_KEY_LEN {
            return Err(Error::Validation(format!(
                "public_key must be at least {MIN_PUBLIC_KEY_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Text fed to the embedding provider at registration time.
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.context_brief,
            self.capabilities.join(" ")
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stored / returned record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: String,
    pub name: String,
    pub agent_type: String,
    pub endpoint: String,
    pub context_brief: String,
    pub capabilities: Vec<String>,
    pub owner: String,
    pub public_key: String,
    pub version: String,
    pub communication_mode: CommunicationMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub language_support: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    pub status: AgentStatus,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AgentMetrics>,
    /// Only set on search responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

impl AgentInfo {
    /// Build a fresh record from a registration; both timestamps start at
    /// `now` so `registered_at ≤ last_seen` holds from the first instant.
    pub fn from_registration(reg: AgentRegistration, now: DateTime<Utc>) -> Self {
        Self {
            agent_id: reg.agent_id,
            name: reg.name,
            agent_type: reg.agent_type,
            endpoint: reg.endpoint,
            context_brief: reg.context_brief,
            capabilities: reg.capabilities,
            owner: reg.owner,
            public_key: reg.public_key,
            version: reg.version,
            communication_mode: reg.communication_mode,
            features: reg.features,
            max_tokens: reg.max_tokens,
            language_support: reg.language_support,
            rate_limit: reg.rate_limit,
            requirements: reg.requirements,
            policy_tags: reg.policy_tags,
            metadata: reg.metadata,
            status: AgentStatus::Alive,
            registered_at: now,
            last_seen: now,
            metrics: None,
            similarity: None,
        }
    }

    /// Public (unauthenticated) view: key material, ownership and free-form
    /// metadata are stripped.
    pub fn redacted(&self) -> PublicAgentInfo {
        PublicAgentInfo {
            agent_id: self.agent_id.clone(),
            name: self.name.clone(),
            agent_type: self.agent_type.clone(),
            endpoint: self.endpoint.clone(),
            context_brief: self.context_brief.clone(),
            capabilities: self.capabilities.clone(),
            version: self.version.clone(),
            communication_mode: self.communication_mode,
            features: self.features.clone(),
            language_support: self.language_support.clone(),
            status: self.status,
            last_seen: self.last_seen,
            similarity: self.similarity,
        }
    }
}

/// Redacted projection served on `/public/*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicAgentInfo {
    pub agent_id: String,
    pub name: String,
    pub agent_type: String,
    pub endpoint: String,
    pub context_brief: String,
    pub capabilities: Vec<String>,
    pub version: String,
    pub communication_mode: CommunicationMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub language_support: Vec<String>,
    pub status: AgentStatus,
    pub last_seen: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Metrics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub agent_id: String,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default)]
    pub avg_response_time: f64,
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default = "d_reputation")]
    pub reputation_score: f64,
    #[serde(default)]
    pub requests_processed: u64,
    #[serde(default)]
    pub average_response_time: f64,
    #[serde(default)]
    pub error_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

fn d_reputation() -> f64 {
    3.0
}

impl AgentMetrics {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            success_rate: 0.0,
            avg_response_time: 0.0,
            total_requests: 0,
            reputation_score: d_reputation(),
            requests_processed: 0,
            average_response_time: 0.0,
            error_rate: 0.0,
            last_active: None,
        }
    }

    /// Merge a partial update. Unknown keys are ignored; ranged fields are
    /// clamped; `total_requests` never decreases within a single call.
    pub fn merge(&mut self, partial: &serde_json::Value) {
        let Some(map) = partial.as_object() else {
            return;
        };
        for (key, value) in map {
            match key.as_str() {
                "success_rate" => {
                    if let Some(v) = value.as_f64() {
                        self.success_rate = v.clamp(0.0, 1.0);
                    }
                }
                "avg_response_time" => {
                    if let Some(v) = value.as_f64() {
                        self.avg_response_time = v.max(0.0);
                    }
                }
                "total_requests" => {
                    if let Some(v) = value.as_u64() {
                        self.total_requests = self.total_requests.max(v);
                    }
                }
                "reputation_score" => {
                    if let Some(v) = value.as_f64() {
                        self.reputation_score = v.clamp(0.0, 5.0);
                    }
                }
                "requests_processed" => {
                    if let Some(v) = value.as_u64() {
                        self.requests_processed = v;
                    }
                }
                "average_response_time" => {
                    if let Some(v) = value.as_f64() {
                        self.average_response_time = v.max(0.0);
                    }
                }
                "error_rate" => {
                    if let Some(v) = value.as_f64() {
                        self.error_rate = v.clamp(0.0, 1.0);
                    }
                }
                "last_active" => {
                    if let Some(v) = value.as_str() {
                        if let Ok(ts) = v.parse::<DateTime<Utc>>() {
                            self.last_active = Some(ts);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Heartbeat & list filters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub agent_id: String,
    pub status: String,
    pub last_seen: DateTime<Utc>,
}

/// `GET /agents` filters. Multi-valued filters use all-match semantics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AgentStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

impl ListFilter {
    pub fn matches(&self, agent: &AgentInfo) -> bool {
        if let Some(t) = &self.agent_type {
            if &agent.agent_type != t {
                return false;
            }
        }
        if let Some(s) = self.status {
            if agent.status != s {
                return false;
            }
        }
        self.capabilities
            .iter()
            .all(|c| agent.capabilities.contains(c))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(id: &str) -> AgentRegistration {
        AgentRegistration {
            agent_id: id.into(),
            name: format!("{id} agent"),
            agent_type: "testing".into(),
            endpoint: "https://agent.example.com/api".into(),
            context_brief: "a test agent".into(),
            capabilities: vec!["test".into()],
            owner: "owner".into(),
            public_key: "k".repeat(MIN_PUBLIC_KEY_LEN),
            version: "1.0.0".into(),
            communication_mode: CommunicationMode::Remote,
            features: vec![],
            max_tokens: None,
            language_support: vec![],
            rate_limit: None,
            requirements: None,
            policy_tags: vec![],
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(registration("a1").validate().is_ok());
    }

    #[test]
    fn invalid_endpoint_rejected() {
        let mut reg = registration("a1");
        reg.endpoint = "invalid-url".into();
        assert!(matches!(reg.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn empty_capabilities_rejected() {
        let mut reg = registration("a1");
        reg.capabilities.clear();
        assert!(reg.validate().is_err());
    }

    #[test]
    fn short_public_key_rejected() {
        let mut reg = registration("a1");
        reg.public_key = "too-short".into();
        assert!(reg.validate().is_err());
    }

    #[test]
    fn redacted_view_strips_sensitive_fields() {
        let now = Utc::now();
        let mut info = AgentInfo::from_registration(registration("a1"), now);
        info.metadata.insert("secret".into(), serde_json::json!("x"));
        let public = info.redacted();
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("public_key").is_none());
        assert!(json.get("owner").is_none());
        assert!(json.get("metadata").is_none());
        assert_eq!(json["agent_id"], "a1");
    }

    #[test]
    fn metrics_merge_ignores_unknown_keys() {
        let mut m = AgentMetrics::new("a1");
        m.merge(&serde_json::json!({
            "requests_processed": 100,
            "average_response_time": 0.5,
            "error_rate": 0.01,
            "bogus_field": "ignored",
        }));
        assert_eq!(m.requests_processed, 100);
        assert!((m.average_response_time - 0.5).abs() < f64::EPSILON);
        assert!((m.error_rate - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn metrics_total_requests_never_decreases() {
        let mut m = AgentMetrics::new("a1");
        m.merge(&serde_json::json!({ "total_requests": 50 }));
        m.merge(&serde_json::json!({ "total_requests": 10 }));
        assert_eq!(m.total_requests, 50);
    }

    #[test]
    fn metrics_ranges_are_clamped() {
        let mut m = AgentMetrics::new("a1");
        m.merge(&serde_json::json!({
            "success_rate": 1.7,
            "reputation_score": 9.0,
            "error_rate": -0.5,
        }));
        assert!((m.success_rate - 1.0).abs() < f64::EPSILON);
        assert!((m.reputation_score - 5.0).abs() < f64::EPSILON);
        assert_eq!(m.error_rate, 0.0);
    }

    #[test]
    fn list_filter_all_match_semantics() {
        let now = Utc::now();
        let mut reg = registration("a1");
        reg.capabilities = vec!["scan".into(), "alerting".into()];
        let info = AgentInfo::from_registration(reg, now);

        let both = ListFilter {
            capabilities: vec!["scan".into(), "alerting".into()],
            ..ListFilter::default()
        };
        assert!(both.matches(&info));

        let missing = ListFilter {
            capabilities: vec!["scan".into(), "reporting".into()],
            ..ListFilter::default()
        };
        assert!(!missing.matches(&info));

        let wrong_type = ListFilter {
            agent_type: Some("security".into()),
            ..ListFilter::default()
        };
        assert!(!wrong_type.matches(&info));
    }
}
