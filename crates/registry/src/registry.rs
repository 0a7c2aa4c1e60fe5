//! The authoritative agent registry.
//!
//! Five coupled maps guarded by one `RwLock`: agent records, embeddings,
//! metrics, info hashes, and key bindings (`sha256(agent_key) → agent_id`).
//! Every mutation writes through to the storage adapter; reads come from the
//! in-memory snapshot. Per-agent mutation serialization lives in
//! [`AgentLockMap`]; `list`/`search`/`stats` never take those locks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::json;

use arcp_domain::config::RegistryConfig;
use arcp_domain::error::{Error, Result};
use arcp_embeddings::EmbeddingProvider;
use arcp_protocol::{
    AgentInfo, AgentMetrics, AgentRegistration, AgentStatus, HeartbeatResponse, ListFilter,
};
use arcp_storage::StorageAdapter;

use crate::bus::{AgentEvent, MetricsEvent, NotificationBus};
use crate::info_hash::info_hash;
use crate::locks::AgentLockMap;

pub(crate) const AGENTS_BUCKET: &str = "agents";
pub(crate) const EMBEDDINGS_BUCKET: &str = "embeddings";
pub(crate) const METRICS_BUCKET: &str = "metrics";
pub(crate) const HASHES_BUCKET: &str = "info_hashes";
pub(crate) const KEYS_BUCKET: &str = "agent_keys";

/// What a registration did. Callers pattern-match instead of parsing
/// messages. `Created` also covers the in-place update of a live record
/// whose descriptive fields changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Created,
    AlreadyAlive,
    ReplacedDead,
}

/// Aggregate counts served on `/public/stats` and the WS stream.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegistryStats {
    pub total_agents: usize,
    pub alive_agents: usize,
    pub dead_agents: usize,
    pub agent_types: HashMap<String, usize>,
}

#[derive(Default)]
pub(crate) struct RegistryState {
    pub agents: HashMap<String, AgentInfo>,
    pub embeddings: HashMap<String, Vec<f32>>,
    pub metrics: HashMap<String, AgentMetrics>,
    pub info_hashes: HashMap<String, String>,
    pub key_bindings: HashMap<String, String>,
}

pub struct AgentRegistry {
    pub(crate) storage: Arc<StorageAdapter>,
    pub(crate) embeddings: Arc<dyn EmbeddingProvider>,
    pub(crate) config: RegistryConfig,
    pub(crate) state: RwLock<RegistryState>,
    bus: NotificationBus,
    locks: AgentLockMap,
}

impl AgentRegistry {
    pub fn new(
        storage: Arc<StorageAdapter>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            storage,
            embeddings,
            config: config.clamped(),
            state: RwLock::new(RegistryState::default()),
            bus: NotificationBus::default(),
            locks: AgentLockMap::new(),
        }
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embeddings
    }

    /// `alive` iff `now − last_seen ≤ heartbeat_timeout`.
    pub(crate) fn is_alive(&self, last_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - last_seen).num_seconds() <= self.config.heartbeat_timeout_secs as i64
    }

    /// Attach the computed status and current metrics to a record clone.
    pub(crate) fn finalize(&self, mut info: AgentInfo, now: DateTime<Utc>) -> AgentInfo {
        info.status = if self.is_alive(info.last_seen, now) {
            AgentStatus::Alive
        } else {
            AgentStatus::Dead
        };
        info.metrics = self.state.read().metrics.get(&info.agent_id).cloned();
        info
    }

    /// Write-through that accepts degraded durability.
    async fn put(&self, bucket: &str, key: &str, value: &serde_json::Value) -> Result<()> {
        match self.storage.hset(bucket, key, value).await {
            Ok(()) | Err(Error::BackendTransient(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn drop_key(&self, bucket: &str, key: &str) {
        if let Err(e) = self.storage.hdel(bucket, key).await {
            if !matches!(e, Error::BackendTransient(_)) {
                tracing::warn!(bucket, key, error = %e, "storage delete failed");
            }
        }
    }

    /// Restore a bucket entry to its pre-registration value, or remove it if
    /// it did not exist.
    async fn restore(&self, bucket: &str, key: &str, old: Option<serde_json::Value>) {
        match old {
            Some(value) => {
                if let Err(e) = self.put(bucket, key, &value).await {
                    tracing::warn!(bucket, key, error = %e, "rollback restore failed");
                }
            }
            None => self.drop_key(bucket, key).await,
        }
    }

    /// Release a key binding claimed earlier in a failed registration.
    async fn release_claim(&self, key_hash: &str) {
        self.state.write().key_bindings.remove(key_hash);
        self.drop_key(KEYS_BUCKET, key_hash).await;
    }

    async fn undo_claim(&self, newly_claimed: bool, key_hash: Option<&str>) {
        if newly_claimed {
            if let Some(key_hash) = key_hash {
                self.release_claim(key_hash).await;
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // register
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Register (or re-register) an agent.
    ///
    /// - Idempotent when the agent is alive and its info hash is unchanged:
    ///   no state change, no embedding call.
    /// - A dead record is replaced wholesale.
    /// - With `agent_key_hash`, one live agent per key is enforced: a
    ///   binding held by a different agent fails with `AgentKeyInUse`.
    /// - Embedding generation failure degrades (no vector stored), it never
    ///   fails the registration.
    /// - Storage writes are ordered record → info hash → key binding →
    ///   embedding; a hard failure reverts the prior writes.
    pub async fn register(
        &self,
        reg: AgentRegistration,
        agent_key_hash: Option<String>,
    ) -> Result<(RegistrationOutcome, AgentInfo)> {
        reg.validate()?;
        if !self.config.allowed_agent_types.contains(&reg.agent_type) {
            return Err(Error::AgentRegistration(format!(
                "agent_type \"{}\" is not allowed",
                reg.agent_type
            )));
        }

        let agent_id = reg.agent_id.clone();
        let _permit = self.locks.acquire(&agent_id).await;
        let now = Utc::now();
        let hash = info_hash(&reg);

        // One live agent per key. The claim happens atomically under the
        // state write lock, so concurrent registrations racing for one key
        // see exactly one winner; the claim is released again on any
        // failure below.
        let newly_claimed = if let Some(key_hash) = &agent_key_hash {
            let mut state = self.state.write();
            match state.key_bindings.get(key_hash) {
                Some(holder) if holder != &agent_id => {
                    return Err(Error::AgentKeyInUse(holder.clone()));
                }
                Some(_) => false,
                None => {
                    state
                        .key_bindings
                        .insert(key_hash.clone(), agent_id.clone());
                    true
                }
            }
        } else {
            false
        };

        let (existing, stored_hash, old_embedding) = {
            let state = self.state.read();
            (
                state.agents.get(&agent_id).cloned(),
                state.info_hashes.get(&agent_id).cloned(),
                state.embeddings.get(&agent_id).cloned(),
            )
        };

        let outcome = match &existing {
            Some(record) if self.is_alive(record.last_seen, now) => {
                if stored_hash.as_deref() == Some(hash.as_str()) {
                    // Unchanged re-registration within the heartbeat window:
                    // persist a freshly claimed binding, nothing else moves.
                    if newly_claimed {
                        if let Some(key_hash) = &agent_key_hash {
                            if let Err(e) =
                                self.put(KEYS_BUCKET, key_hash, &json!(agent_id)).await
                            {
                                self.release_claim(key_hash).await;
                                return Err(e);
                            }
                        }
                    }
                    let info = self.finalize(record.clone(), now);
                    return Ok((RegistrationOutcome::AlreadyAlive, info));
                }
                RegistrationOutcome::Created
            }
            Some(_) => RegistrationOutcome::ReplacedDead,
            None => RegistrationOutcome::Created,
        };

        // New or changed descriptive fields: (re)generate the embedding.
        let embedding = if self.embeddings.is_available() {
            match self.embeddings.embed(&reg.embedding_text()).await {
                Ok(vector) => Some(vector),
                Err(e) => {
                    tracing::warn!(agent_id = %agent_id, error = %e, "embedding generation failed, registering without vector");
                    None
                }
            }
        } else {
            None
        };

        let mut info = AgentInfo::from_registration(reg, now);
        if let Some(old) = &existing {
            if outcome == RegistrationOutcome::Created {
                // Live update keeps the original registration instant.
                info.registered_at = old.registered_at;
            }
        }

        // ── ordered write-through with rollback ─────────────────────
        let record_value = serde_json::to_value(&info)?;
        let old_record = existing
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        if let Err(e) = self.put(AGENTS_BUCKET, &agent_id, &record_value).await {
            self.undo_claim(newly_claimed, agent_key_hash.as_deref()).await;
            return Err(e);
        }

        if let Err(e) = self.put(HASHES_BUCKET, &agent_id, &json!(hash)).await {
            self.restore(AGENTS_BUCKET, &agent_id, old_record).await;
            self.undo_claim(newly_claimed, agent_key_hash.as_deref()).await;
            return Err(e);
        }

        if let Some(key_hash) = &agent_key_hash {
            if let Err(e) = self.put(KEYS_BUCKET, key_hash, &json!(agent_id)).await {
                self.restore(HASHES_BUCKET, &agent_id, stored_hash.map(|h| json!(h)))
                    .await;
                self.restore(AGENTS_BUCKET, &agent_id, old_record).await;
                self.undo_claim(newly_claimed, Some(key_hash.as_str())).await;
                return Err(e);
            }
        }

        if let Some(vector) = &embedding {
            if let Err(e) = self.put(EMBEDDINGS_BUCKET, &agent_id, &json!(vector)).await {
                self.restore(HASHES_BUCKET, &agent_id, stored_hash.map(|h| json!(h)))
                    .await;
                self.restore(AGENTS_BUCKET, &agent_id, old_record).await;
                self.undo_claim(newly_claimed, agent_key_hash.as_deref()).await;
                return Err(e);
            }
        } else if old_embedding.is_some() {
            // Descriptive fields changed but no new vector could be made;
            // drop the stale one rather than serve mismatched similarity.
            self.drop_key(EMBEDDINGS_BUCKET, &agent_id).await;
        }

        {
            // Key binding already claimed atomically above.
            let mut state = self.state.write();
            state.agents.insert(agent_id.clone(), info.clone());
            state.info_hashes.insert(agent_id.clone(), hash);
            match &embedding {
                Some(vector) => {
                    state.embeddings.insert(agent_id.clone(), vector.clone());
                }
                None => {
                    state.embeddings.remove(&agent_id);
                }
            }
        }

        tracing::info!(
            agent_id = %agent_id,
            agent_type = %info.agent_type,
            outcome = ?outcome,
            embedded = embedding.is_some(),
            "agent registered"
        );
        self.bus.publish_agent(AgentEvent::Registered {
            agent_id: agent_id.clone(),
        });

        Ok((outcome, self.finalize(info, now)))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // heartbeat / metrics
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Update `last_seen = now`. Never resurrects an unregistered record.
    pub async fn heartbeat(&self, agent_id: &str) -> Result<HeartbeatResponse> {
        let _permit = self.locks.acquire(agent_id).await;
        let now = Utc::now();

        let mut record = self
            .state
            .read()
            .agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))?;
        record.last_seen = now;

        self.put(AGENTS_BUCKET, agent_id, &serde_json::to_value(&record)?)
            .await?;
        self.state
            .write()
            .agents
            .insert(agent_id.to_string(), record);

        self.bus.publish_agent(AgentEvent::Heartbeat {
            agent_id: agent_id.to_string(),
        });
        Ok(HeartbeatResponse {
            agent_id: agent_id.to_string(),
            status: "success".into(),
            last_seen: now,
        })
    }

    /// Merge a partial metrics update. Unknown keys are ignored.
    pub async fn update_metrics(
        &self,
        agent_id: &str,
        partial: &serde_json::Value,
    ) -> Result<AgentMetrics> {
        let _permit = self.locks.acquire(agent_id).await;
        if !self.state.read().agents.contains_key(agent_id) {
            return Err(Error::AgentNotFound(agent_id.to_string()));
        }

        let mut metrics = self
            .state
            .read()
            .metrics
            .get(agent_id)
            .cloned()
            .unwrap_or_else(|| AgentMetrics::new(agent_id));
        metrics.merge(partial);

        self.put(METRICS_BUCKET, agent_id, &serde_json::to_value(&metrics)?)
            .await?;
        self.state
            .write()
            .metrics
            .insert(agent_id.to_string(), metrics.clone());

        self.bus.publish_metrics(MetricsEvent {
            agent_id: agent_id.to_string(),
        });
        Ok(metrics)
    }

    pub fn get_metrics(&self, agent_id: &str) -> Result<Option<AgentMetrics>> {
        if !self.state.read().agents.contains_key(agent_id) {
            return Err(Error::AgentNotFound(agent_id.to_string()));
        }
        Ok(self.state.read().metrics.get(agent_id).cloned())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // unregister
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Remove the record, embedding, metrics, info hash, and any key
    /// binding pointing at this agent, atomically from the snapshot's point
    /// of view.
    pub async fn unregister(&self, agent_id: &str) -> Result<()> {
        let _permit = self.locks.acquire(agent_id).await;

        let in_memory = self.state.read().agents.contains_key(agent_id);
        if !in_memory {
            // A record can exist only in storage (e.g. left over from a
            // previous process); clean it up all the same.
            if !self.storage.h_exists(AGENTS_BUCKET, agent_id).await? {
                return Err(Error::AgentNotFound(agent_id.to_string()));
            }
        }

        let bound_keys: Vec<String> = {
            let state = self.state.read();
            state
                .key_bindings
                .iter()
                .filter(|(_, bound)| bound.as_str() == agent_id)
                .map(|(key_hash, _)| key_hash.clone())
                .collect()
        };

        self.drop_key(AGENTS_BUCKET, agent_id).await;
        self.drop_key(EMBEDDINGS_BUCKET, agent_id).await;
        self.drop_key(METRICS_BUCKET, agent_id).await;
        self.drop_key(HASHES_BUCKET, agent_id).await;
        for key_hash in &bound_keys {
            self.drop_key(KEYS_BUCKET, key_hash).await;
        }

        {
            let mut state = self.state.write();
            state.agents.remove(agent_id);
            state.embeddings.remove(agent_id);
            state.metrics.remove(agent_id);
            state.info_hashes.remove(agent_id);
            for key_hash in &bound_keys {
                state.key_bindings.remove(key_hash);
            }
        }

        tracing::info!(agent_id = %agent_id, "agent unregistered");
        self.bus.publish_agent(AgentEvent::Unregistered {
            agent_id: agent_id.to_string(),
        });
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // reads (snapshot views)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn get(&self, agent_id: &str) -> Result<AgentInfo> {
        let record = self
            .state
            .read()
            .agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))?;
        Ok(self.finalize(record, Utc::now()))
    }

    pub fn list(&self, filter: &ListFilter) -> Vec<AgentInfo> {
        let now = Utc::now();
        let records: Vec<AgentInfo> = self.state.read().agents.values().cloned().collect();
        let mut agents: Vec<AgentInfo> = records
            .into_iter()
            .map(|r| self.finalize(r, now))
            .filter(|a| filter.matches(a))
            .collect();
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        agents
    }

    /// The agent currently bound to `sha256(agent_key)`, if any.
    pub fn get_agent_by_key(&self, key_hash: &str) -> Option<String> {
        self.state.read().key_bindings.get(key_hash).cloned()
    }

    /// Distinct agent types currently registered.
    pub fn agent_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .state
            .read()
            .agents
            .values()
            .map(|a| a.agent_type.clone())
            .collect();
        types.sort();
        types.dedup();
        types
    }

    pub fn stats(&self) -> RegistryStats {
        let now = Utc::now();
        let state = self.state.read();
        let mut alive = 0;
        let mut agent_types: HashMap<String, usize> = HashMap::new();
        for agent in state.agents.values() {
            if self.is_alive(agent.last_seen, now) {
                alive += 1;
            }
            *agent_types.entry(agent.agent_type.clone()).or_default() += 1;
        }
        RegistryStats {
            total_agents: state.agents.len(),
            alive_agents: alive,
            dead_agents: state.agents.len() - alive,
            agent_types,
        }
    }

    /// Raw record fetch, bypassing status computation. Operational tooling
    /// and tests; prefer [`get`](Self::get).
    pub fn agent_record(&self, agent_id: &str) -> Option<AgentInfo> {
        self.state.read().agents.get(agent_id).cloned()
    }

    /// Raw record store, bypassing lifecycle semantics. Operational tooling
    /// and tests; prefer [`register`](Self::register).
    pub async fn store_agent_record(&self, info: AgentInfo) -> Result<()> {
        self.put(AGENTS_BUCKET, &info.agent_id, &serde_json::to_value(&info)?)
            .await?;
        self.state
            .write()
            .agents
            .insert(info.agent_id.clone(), info);
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // staleness
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// One sweep over the stored records, unregistering agents whose
    /// `last_seen` is older than `max(min_threshold, 2×heartbeat_timeout)`.
    ///
    /// Entries with a missing or unparseable `last_seen` are skipped, never
    /// deleted. Per-agent failures do not stop the sweep.
    pub async fn cleanup_stale(&self) -> Result<usize> {
        let now = Utc::now();
        let threshold = self.config.stale_threshold_secs() as i64;
        let mut cleaned = 0;

        for agent_id in self.storage.hkeys(AGENTS_BUCKET).await? {
            let raw = match self.storage.hget(AGENTS_BUCKET, &agent_id).await {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(agent_id = %agent_id, error = %e, "cleanup read failed");
                    continue;
                }
            };
            let last_seen = raw
                .get("last_seen")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<DateTime<Utc>>().ok());
            let Some(last_seen) = last_seen else {
                tracing::warn!(agent_id = %agent_id, "unparseable last_seen, skipping");
                continue;
            };
            if (now - last_seen).num_seconds() <= threshold {
                continue;
            }
            match self.unregister(&agent_id).await {
                Ok(()) => {
                    tracing::info!(agent_id = %agent_id, "stale agent cleaned up");
                    cleaned += 1;
                }
                Err(Error::AgentNotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(agent_id = %agent_id, error = %e, "stale cleanup failed");
                }
            }
        }
        Ok(cleaned)
    }

    /// Rebuild the in-memory maps from the backing store (startup path).
    /// Undecodable entries are skipped with a warning. Returns the number of
    /// restored agent records.
    pub async fn hydrate(&self) -> Result<usize> {
        let mut restored = 0;
        for agent_id in self.storage.hkeys(AGENTS_BUCKET).await? {
            let Some(raw) = self.storage.hget(AGENTS_BUCKET, &agent_id).await? else {
                continue;
            };
            let record: AgentInfo = match serde_json::from_value(raw) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(agent_id = %agent_id, error = %e, "undecodable stored record, skipping");
                    continue;
                }
            };

            let embedding = match self.storage.hget(EMBEDDINGS_BUCKET, &agent_id).await? {
                Some(v) => serde_json::from_value::<Vec<f32>>(v).ok(),
                None => None,
            };
            let metrics = match self.storage.hget(METRICS_BUCKET, &agent_id).await? {
                Some(v) => serde_json::from_value::<AgentMetrics>(v).ok(),
                None => None,
            };
            let hash = match self.storage.hget(HASHES_BUCKET, &agent_id).await? {
                Some(v) => v.as_str().map(String::from),
                None => None,
            };

            let mut state = self.state.write();
            state.agents.insert(agent_id.clone(), record);
            if let Some(vector) = embedding {
                state.embeddings.insert(agent_id.clone(), vector);
            }
            if let Some(m) = metrics {
                state.metrics.insert(agent_id.clone(), m);
            }
            if let Some(h) = hash {
                state.info_hashes.insert(agent_id.clone(), h);
            }
            restored += 1;
        }

        for key_hash in self.storage.hkeys(KEYS_BUCKET).await? {
            if let Some(value) = self.storage.hget(KEYS_BUCKET, &key_hash).await? {
                if let Some(agent_id) = value.as_str() {
                    // Invariant: a binding must point at a stored record.
                    if self.state.read().agents.contains_key(agent_id) {
                        self.state
                            .write()
                            .key_bindings
                            .insert(key_hash, agent_id.to_string());
                    } else {
                        self.drop_key(KEYS_BUCKET, &key_hash).await;
                    }
                }
            }
        }

        if restored > 0 {
            tracing::info!(restored, "registry hydrated from storage");
        }
        Ok(restored)
    }
}
