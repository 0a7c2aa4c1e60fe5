//! End-to-end registry behavior: registration lifecycle, key uniqueness,
//! staleness cleanup, and semantic search with and without an embedding
//! provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use arcp_domain::config::{RegistryConfig, SearchConfig};
use arcp_domain::error::{Error, Result};
use arcp_embeddings::{EmbeddingProvider, NullEmbeddings};
use arcp_protocol::{AgentRegistration, AgentStatus, CommunicationMode, ListFilter, SearchRequest};
use arcp_registry::{AgentRegistry, RegistrationOutcome};
use arcp_storage::StorageAdapter;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Test doubles & helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Deterministic embeddings: one axis per domain keyword, so texts about
/// the same domain land close together.
struct KeywordEmbeddings;

const AXES: [&str; 8] = [
    "vulnerability",
    "scan",
    "security",
    "monitor",
    "automation",
    "network",
    "test",
    "alert",
];

#[async_trait]
impl EmbeddingProvider for KeywordEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(AXES
            .iter()
            .map(|axis| {
                if lower.contains(axis) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn dimensions(&self) -> usize {
        AXES.len()
    }
}

/// Provider that claims availability but always fails.
struct BrokenEmbeddings;

#[async_trait]
impl EmbeddingProvider for BrokenEmbeddings {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::Embedding("backend unreachable".into()))
    }
    fn is_available(&self) -> bool {
        true
    }
    fn dimensions(&self) -> usize {
        8
    }
}

fn registry_with(provider: Arc<dyn EmbeddingProvider>) -> (Arc<AgentRegistry>, Arc<StorageAdapter>) {
    let storage = Arc::new(StorageAdapter::memory_only());
    let registry = Arc::new(AgentRegistry::new(
        storage.clone(),
        provider,
        RegistryConfig::default(),
    ));
    (registry, storage)
}

fn registration(agent_id: &str, agent_type: &str, caps: &[&str], brief: &str) -> AgentRegistration {
    AgentRegistration {
        agent_id: agent_id.into(),
        name: format!("{agent_id} agent"),
        agent_type: agent_type.into(),
        endpoint: format!("https://{agent_id}.example.com/api"),
        context_brief: brief.into(),
        capabilities: caps.iter().map(|c| c.to_string()).collect(),
        owner: "owner".into(),
        public_key: "k".repeat(64),
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

fn search(query: &str, top_k: usize, min_similarity: f32) -> SearchRequest {
    SearchRequest {
        query: query.into(),
        top_k: Some(top_k),
        min_similarity: Some(min_similarity),
        agent_type: None,
        capabilities: vec![],
        weighted: false,
    }
}

async fn backdate(registry: &AgentRegistry, agent_id: &str, secs: i64) {
    let mut record = registry.agent_record(agent_id).expect("record exists");
    record.last_seen = Utc::now() - Duration::seconds(secs);
    registry.store_agent_record(record).await.unwrap();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registration lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn registration_lifecycle() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));

    let reg = registration("sec-1", "security", &["vscan"], "vulnerability scanning");
    let (outcome, info) = registry
        .register(reg, Some("key-hash-1".into()))
        .await
        .unwrap();
    assert_eq!(outcome, RegistrationOutcome::Created);
    assert_eq!(info.status, AgentStatus::Alive);
    assert!(info.registered_at <= info.last_seen);

    let hb = registry.heartbeat("sec-1").await.unwrap();
    assert_eq!(hb.status, "success");

    // Two hours without a heartbeat: the cleanup sweep removes it.
    backdate(&registry, "sec-1", 2 * 3600).await;
    let cleaned = registry.cleanup_stale().await.unwrap();
    assert_eq!(cleaned, 1);
    assert!(matches!(
        registry.get("sec-1"),
        Err(Error::AgentNotFound(_))
    ));
    // Its key binding went with it.
    assert!(registry.get_agent_by_key("key-hash-1").is_none());
}

#[tokio::test]
async fn reregistration_is_idempotent_within_heartbeat_window() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    let reg = registration("a1", "testing", &["test"], "a test agent");

    let (first, info1) = registry.register(reg.clone(), None).await.unwrap();
    assert_eq!(first, RegistrationOutcome::Created);

    let (second, info2) = registry.register(reg, None).await.unwrap();
    assert_eq!(second, RegistrationOutcome::AlreadyAlive);

    // The second call is observationally `get` after the first.
    assert_eq!(info1.registered_at, info2.registered_at);
    assert_eq!(info1.last_seen, info2.last_seen);
    let fetched = registry.get("a1").unwrap();
    assert_eq!(fetched.registered_at, info2.registered_at);
}

#[tokio::test]
async fn changed_fields_reregister_in_place() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    let reg = registration("a1", "testing", &["test"], "a test agent");
    let (_, original) = registry.register(reg.clone(), None).await.unwrap();

    let mut changed = reg;
    changed.context_brief = "a different brief".into();
    let (outcome, updated) = registry.register(changed, None).await.unwrap();

    assert_eq!(outcome, RegistrationOutcome::Created);
    assert_eq!(updated.registered_at, original.registered_at);
    assert_eq!(registry.get("a1").unwrap().context_brief, "a different brief");
}

#[tokio::test]
async fn dead_record_is_replaced() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    let reg = registration("a1", "testing", &["test"], "a test agent");
    registry.register(reg.clone(), None).await.unwrap();

    // Age past the heartbeat timeout.
    backdate(&registry, "a1", 3600).await;
    assert_eq!(registry.get("a1").unwrap().status, AgentStatus::Dead);

    let (outcome, info) = registry.register(reg, None).await.unwrap();
    assert_eq!(outcome, RegistrationOutcome::ReplacedDead);
    assert_eq!(info.status, AgentStatus::Alive);
}

#[tokio::test]
async fn disallowed_agent_type_is_rejected() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    let reg = registration("a1", "freeform", &["test"], "brief");
    assert!(matches!(
        registry.register(reg, None).await,
        Err(Error::AgentRegistration(_))
    ));
}

#[tokio::test]
async fn embedding_failure_does_not_fail_registration() {
    let (registry, _) = registry_with(Arc::new(BrokenEmbeddings));
    let reg = registration("a1", "testing", &["test"], "a test agent");
    let (outcome, _) = registry.register(reg, None).await.unwrap();
    assert_eq!(outcome, RegistrationOutcome::Created);

    // Search still works through the lexical fallback.
    let results = registry
        .search(&search("test agent", 5, 0.1), &SearchConfig::default())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Key uniqueness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn agent_key_binds_one_live_agent() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));

    registry
        .register(
            registration("a", "testing", &["test"], "first"),
            Some("H(k)".into()),
        )
        .await
        .unwrap();

    // A different agent presenting the same key is refused, naming the
    // holder.
    let err = registry
        .register(
            registration("b", "testing", &["test"], "second"),
            Some("H(k)".into()),
        )
        .await
        .unwrap_err();
    match err {
        Error::AgentKeyInUse(holder) => assert_eq!(holder, "a"),
        other => panic!("unexpected error: {other:?}"),
    }

    // After the holder unregisters, the key is free again.
    registry.unregister("a").await.unwrap();
    assert!(registry.get_agent_by_key("H(k)").is_none());
    registry
        .register(
            registration("b", "testing", &["test"], "second"),
            Some("H(k)".into()),
        )
        .await
        .unwrap();
    assert_eq!(registry.get_agent_by_key("H(k)").as_deref(), Some("b"));
}

#[tokio::test]
async fn same_agent_reregisters_with_its_own_key() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    let reg = registration("a", "testing", &["test"], "brief");

    registry.register(reg.clone(), Some("H(k)".into())).await.unwrap();
    let (outcome, _) = registry.register(reg, Some("H(k)".into())).await.unwrap();
    assert_eq!(outcome, RegistrationOutcome::AlreadyAlive);
    assert_eq!(registry.get_agent_by_key("H(k)").as_deref(), Some("a"));
}

#[tokio::test]
async fn concurrent_registrations_with_one_key_yield_one_winner() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));

    let r1 = registry.clone();
    let r2 = registry.clone();
    let t1 = tokio::spawn(async move {
        r1.register(
            registration("a1", "testing", &["test"], "one"),
            Some("H(k)".into()),
        )
        .await
    });
    let t2 = tokio::spawn(async move {
        r2.register(
            registration("a2", "testing", &["test"], "two"),
            Some("H(k)".into()),
        )
        .await
    });

    let results = [t1.await.unwrap(), t2.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let key_conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(Error::AgentKeyInUse(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(key_conflicts, 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Heartbeat & cleanup
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn heartbeat_is_monotone_and_requires_existence() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    registry
        .register(registration("a1", "testing", &["test"], "brief"), None)
        .await
        .unwrap();

    let first = registry.heartbeat("a1").await.unwrap();
    let second = registry.heartbeat("a1").await.unwrap();
    assert!(second.last_seen >= first.last_seen);

    assert!(matches!(
        registry.heartbeat("ghost").await,
        Err(Error::AgentNotFound(_))
    ));
}

#[tokio::test]
async fn heartbeat_never_resurrects_an_unregistered_agent() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    registry
        .register(registration("a1", "testing", &["test"], "brief"), None)
        .await
        .unwrap();
    registry.unregister("a1").await.unwrap();

    assert!(matches!(
        registry.heartbeat("a1").await,
        Err(Error::AgentNotFound(_))
    ));
    assert!(matches!(registry.get("a1"), Err(Error::AgentNotFound(_))));
}

#[tokio::test]
async fn cleanup_spares_fresh_and_unparseable_records() {
    let (registry, storage) = registry_with(Arc::new(KeywordEmbeddings));

    registry
        .register(registration("fresh", "testing", &["test"], "brief"), None)
        .await
        .unwrap();
    registry
        .register(registration("stale", "testing", &["test"], "brief"), None)
        .await
        .unwrap();
    backdate(&registry, "stale", 2 * 3600).await;

    // A record whose last_seen cannot be parsed must never be deleted.
    storage
        .hset(
            "agents",
            "garbled",
            &serde_json::json!({ "agent_id": "garbled", "last_seen": "not-a-timestamp" }),
        )
        .await
        .unwrap();

    let cleaned = registry.cleanup_stale().await.unwrap();
    assert_eq!(cleaned, 1);
    assert!(registry.get("fresh").is_ok());
    assert!(storage.h_exists("agents", "garbled").await.unwrap());
}

#[tokio::test]
async fn metrics_merge_and_survive_reregistration() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    let reg = registration("a1", "testing", &["test"], "brief");
    registry.register(reg.clone(), None).await.unwrap();

    registry
        .update_metrics(
            "a1",
            &serde_json::json!({
                "requests_processed": 100,
                "average_response_time": 0.5,
                "error_rate": 0.01,
                "unknown_key": "ignored",
            }),
        )
        .await
        .unwrap();

    let metrics = registry.get_metrics("a1").unwrap().unwrap();
    assert_eq!(metrics.requests_processed, 100);

    // A changed re-registration keeps the metrics record.
    let mut changed = reg;
    changed.version = "1.0.1".into();
    registry.register(changed, None).await.unwrap();
    assert!(registry.get_metrics("a1").unwrap().is_some());

    assert!(matches!(
        registry.update_metrics("ghost", &serde_json::json!({})).await,
        Err(Error::AgentNotFound(_))
    ));
}

#[tokio::test]
async fn list_filters_compose() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    registry
        .register(
            registration("sec-1", "security", &["vscan", "alerting"], "scans"),
            None,
        )
        .await
        .unwrap();
    registry
        .register(
            registration("mon-1", "monitoring", &["alerting"], "monitors"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(registry.list(&ListFilter::default()).len(), 2);

    let security = registry.list(&ListFilter {
        agent_type: Some("security".into()),
        ..ListFilter::default()
    });
    assert_eq!(security.len(), 1);
    assert_eq!(security[0].agent_id, "sec-1");

    let alerting = registry.list(&ListFilter {
        capabilities: vec!["alerting".into()],
        ..ListFilter::default()
    });
    assert_eq!(alerting.len(), 2);

    let both = registry.list(&ListFilter {
        capabilities: vec!["alerting".into(), "vscan".into()],
        ..ListFilter::default()
    });
    assert_eq!(both.len(), 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn seed_search_agents(registry: &AgentRegistry) {
    registry
        .register(
            registration(
                "sec-1",
                "security",
                &["vscan"],
                "vulnerability scanning and security analysis",
            ),
            None,
        )
        .await
        .unwrap();
    registry
        .register(
            registration(
                "auto-1",
                "automation",
                &["deploy"],
                "deployment automation workflows",
            ),
            None,
        )
        .await
        .unwrap();
    registry
        .register(
            registration(
                "mon-1",
                "monitoring",
                &["alerting"],
                "infrastructure monitoring and alerting",
            ),
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn search_with_type_filter_returns_sorted_matches() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    seed_search_agents(&registry).await;

    let mut req = search("vulnerability scanning", 5, 0.3);
    req.agent_type = Some("security".into());
    let results = registry.search(&req, &SearchConfig::default()).await.unwrap();

    assert!(!results.is_empty());
    for agent in &results {
        assert_eq!(agent.agent_type, "security");
        assert!(agent.similarity.unwrap() >= 0.3);
    }
    // Non-increasing similarity.
    for pair in results.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[tokio::test]
async fn search_excludes_dead_agents_and_empty_filter_is_empty() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    seed_search_agents(&registry).await;
    backdate(&registry, "sec-1", 3600).await;

    let results = registry
        .search(&search("vulnerability security scan", 10, 0.0), &SearchConfig::default())
        .await
        .unwrap();
    assert!(results.iter().all(|a| a.agent_id != "sec-1"));

    let mut req = search("anything", 10, 0.0);
    req.agent_type = Some("no-such-type".into());
    let results = registry.search(&req, &SearchConfig::default()).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn search_ties_break_by_agent_id() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    // Two agents with identical descriptive text → identical vectors.
    for id in ["zeta", "alpha"] {
        registry
            .register(registration(id, "testing", &["test"], "network monitor"), None)
            .await
            .unwrap();
    }

    let results = registry
        .search(&search("network monitor", 5, 0.0), &SearchConfig::default())
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].agent_id, "alpha");
    assert_eq!(results[1].agent_id, "zeta");
}

#[tokio::test]
async fn fallback_search_honors_top_k_and_min_similarity() {
    let (registry, _) = registry_with(Arc::new(NullEmbeddings::new(8)));
    seed_search_agents(&registry).await;

    let results = registry
        .search(&search("monitoring alerting infrastructure", 2, 0.2), &SearchConfig::default())
        .await
        .unwrap();

    assert!(results.len() <= 2);
    for agent in &results {
        let similarity = agent.similarity.unwrap();
        assert!((0.2..=1.0).contains(&similarity));
    }
    for pair in results.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[tokio::test]
async fn weighted_search_prefers_reputation() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    for id in ["low-rep", "high-rep"] {
        registry
            .register(registration(id, "testing", &["test"], "network monitor"), None)
            .await
            .unwrap();
    }
    registry
        .update_metrics("high-rep", &serde_json::json!({ "reputation_score": 5.0 }))
        .await
        .unwrap();
    registry
        .update_metrics("low-rep", &serde_json::json!({ "reputation_score": 0.5 }))
        .await
        .unwrap();

    let mut req = search("network monitor", 5, 0.1);
    req.weighted = true;
    let results = registry.search(&req, &SearchConfig::default()).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].agent_id, "high-rep");
    assert!(results[0].similarity > results[1].similarity);
}

#[tokio::test]
async fn empty_query_and_bad_bounds_are_validation_errors() {
    let (registry, _) = registry_with(Arc::new(KeywordEmbeddings));
    let defaults = SearchConfig::default();

    assert!(matches!(
        registry.search(&search("  ", 5, 0.5), &defaults).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        registry.search(&search("q", 0, 0.5), &defaults).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        registry.search(&search("q", 5, 1.5), &defaults).await,
        Err(Error::Validation(_))
    ));
}
