//! The storage adapter: remote backend when available, in-process fallback
//! otherwise, with lazy probing and throttled reconnection.
//!
//! When the backend transitions from unavailable to available no automatic
//! reconciliation is performed; callers own reconciliation semantics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;

use arcp_domain::error::{Error, Result};

use crate::backend::KvBackend;
use crate::memory::MemoryBackend;
use crate::redis_backend::RedisBackend;

/// Reserved bucket backing the single-key `get`/`set`/`delete` forms.
const KV_BUCKET: &str = "kv";

/// Snapshot of the adapter's view of its backend, for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStatus {
    pub backend_configured: bool,
    pub backend_available: bool,
}

struct ProbeState {
    backend: Option<Arc<dyn KvBackend>>,
    available: bool,
    last_check: Option<Instant>,
}

pub struct StorageAdapter {
    remote_url: Option<String>,
    probe: Mutex<ProbeState>,
    probe_ttl: Duration,
    fallback: MemoryBackend,
}

impl StorageAdapter {
    /// Adapter with no remote backend at all.
    pub fn memory_only() -> Self {
        Self {
            remote_url: None,
            probe: Mutex::new(ProbeState {
                backend: None,
                available: false,
                last_check: None,
            }),
            probe_ttl: Duration::from_secs(30),
            fallback: MemoryBackend::new(),
        }
    }

    /// Adapter that lazily connects to a remote backend by URL.
    pub fn with_remote_url(url: String, probe_ttl: Duration) -> Self {
        Self {
            remote_url: Some(url),
            probe: Mutex::new(ProbeState {
                backend: None,
                available: false,
                last_check: None,
            }),
            probe_ttl,
            fallback: MemoryBackend::new(),
        }
    }

    /// Adapter over a pre-built backend (tests).
    pub fn with_backend(backend: Arc<dyn KvBackend>, probe_ttl: Duration) -> Self {
        Self {
            remote_url: None,
            probe: Mutex::new(ProbeState {
                backend: Some(backend),
                available: false,
                last_check: None,
            }),
            probe_ttl,
            fallback: MemoryBackend::new(),
        }
    }

    /// Resolve the remote backend if it is currently usable.
    ///
    /// The availability verdict is cached for `probe_ttl`; a failed probe
    /// (or a failed connect) throttles the next attempt by the same TTL.
    async fn remote(&self) -> Option<Arc<dyn KvBackend>> {
        let mut probe = self.probe.lock().await;

        if probe.backend.is_none() && self.remote_url.is_none() {
            return None;
        }

        if let Some(at) = probe.last_check {
            if at.elapsed() < self.probe_ttl {
                return if probe.available {
                    probe.backend.clone()
                } else {
                    None
                };
            }
        }
        probe.last_check = Some(Instant::now());

        if probe.backend.is_none() {
            let url = self.remote_url.as_deref()?;
            match RedisBackend::connect(url).await {
                Ok(backend) => {
                    tracing::info!("storage backend connected");
                    probe.backend = Some(Arc::new(backend));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "storage backend connect failed, using fallback");
                    probe.available = false;
                    return None;
                }
            }
        }

        let backend = probe.backend.clone()?;
        match backend.ping().await {
            Ok(()) => {
                if !probe.available {
                    tracing::info!("storage backend available");
                }
                probe.available = true;
                Some(backend)
            }
            Err(e) => {
                tracing::warn!(error = %e, "storage backend probe failed, using fallback");
                probe.available = false;
                None
            }
        }
    }

    /// Mark the backend unavailable after an operation failure, throttling
    /// re-probes.
    async fn mark_unavailable(&self) {
        let mut probe = self.probe.lock().await;
        probe.available = false;
        probe.last_check = Some(Instant::now());
    }

    pub async fn status(&self) -> StorageStatus {
        let configured = self.remote_url.is_some() || {
            let probe = self.probe.lock().await;
            probe.backend.is_some()
        };
        StorageStatus {
            backend_configured: configured,
            backend_available: self.remote().await.is_some(),
        }
    }

    // ── hash operations ─────────────────────────────────────────────

    /// Write `bucket[key] = value`. Falls back to in-process storage with
    /// `Error::BackendTransient` when the remote write fails; callers treat
    /// that as success with degraded durability.
    pub async fn hset(&self, bucket: &str, key: &str, value: &Value) -> Result<()> {
        let encoded = value.to_string();
        if let Some(remote) = self.remote().await {
            match remote.hset(bucket, key, &encoded).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    self.mark_unavailable().await;
                    self.fallback.hset(bucket, key, &encoded).await?;
                    return Err(Error::BackendTransient(format!(
                        "hset {bucket}/{key}: {e}"
                    )));
                }
            }
        }
        self.fallback.hset(bucket, key, &encoded).await
    }

    pub async fn hget(&self, bucket: &str, key: &str) -> Result<Option<Value>> {
        if let Some(remote) = self.remote().await {
            match remote.hget(bucket, key).await {
                Ok(Some(raw)) => return Ok(decode(&raw)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(bucket, key, error = %e, "hget failed on backend");
                    self.mark_unavailable().await;
                }
            }
        }
        Ok(self
            .fallback
            .hget(bucket, key)
            .await?
            .and_then(|raw| decode(&raw)))
    }

    /// Keys across both the backend and the fallback (writes may have landed
    /// in either while availability flapped).
    pub async fn hkeys(&self, bucket: &str) -> Result<Vec<String>> {
        let mut keys = self.fallback.hkeys(bucket).await?;
        if let Some(remote) = self.remote().await {
            match remote.hkeys(bucket).await {
                Ok(remote_keys) => {
                    for k in remote_keys {
                        if !keys.contains(&k) {
                            keys.push(k);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(bucket, error = %e, "hkeys failed on backend");
                    self.mark_unavailable().await;
                }
            }
        }
        Ok(keys)
    }

    /// Delete from both stores so a flapping backend cannot resurrect a key.
    pub async fn hdel(&self, bucket: &str, key: &str) -> Result<bool> {
        let mut removed = self.fallback.hdel(bucket, key).await?;
        if let Some(remote) = self.remote().await {
            match remote.hdel(bucket, key).await {
                Ok(r) => removed |= r,
                Err(e) => {
                    self.mark_unavailable().await;
                    return Err(Error::BackendTransient(format!(
                        "hdel {bucket}/{key}: {e}"
                    )));
                }
            }
        }
        Ok(removed)
    }

    pub async fn h_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        if let Some(remote) = self.remote().await {
            match remote.h_exists(bucket, key).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(bucket, key, error = %e, "h_exists failed on backend");
                    self.mark_unavailable().await;
                }
            }
        }
        self.fallback.h_exists(bucket, key).await
    }

    // ── single-key forms ────────────────────────────────────────────

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.hget(KV_BUCKET, key).await
    }

    pub async fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.hset(KV_BUCKET, key, value).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.hdel(KV_BUCKET, key).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.h_exists(KV_BUCKET, key).await
    }
}

fn decode(raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(error = %e, "undecodable stored value, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Test double whose failure mode can be flipped at runtime.
    struct FlakyBackend {
        inner: MemoryBackend,
        down: AtomicBool,
    }

    impl FlakyBackend {
        fn new() -> Self {
            Self {
                inner: MemoryBackend::new(),
                down: AtomicBool::new(false),
            }
        }

        fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        fn check(&self) -> Result<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(Error::Storage("backend down".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl KvBackend for FlakyBackend {
        async fn hset(&self, bucket: &str, key: &str, value: &str) -> Result<()> {
            self.check()?;
            self.inner.hset(bucket, key, value).await
        }
        async fn hget(&self, bucket: &str, key: &str) -> Result<Option<String>> {
            self.check()?;
            self.inner.hget(bucket, key).await
        }
        async fn hkeys(&self, bucket: &str) -> Result<Vec<String>> {
            self.check()?;
            self.inner.hkeys(bucket).await
        }
        async fn hdel(&self, bucket: &str, key: &str) -> Result<bool> {
            self.check()?;
            self.inner.hdel(bucket, key).await
        }
        async fn h_exists(&self, bucket: &str, key: &str) -> Result<bool> {
            self.check()?;
            self.inner.h_exists(bucket, key).await
        }
        async fn ping(&self) -> Result<()> {
            self.check()
        }
    }

    fn adapter_with(backend: Arc<FlakyBackend>) -> StorageAdapter {
        // Zero TTL: every call re-probes, which is what the tests need.
        StorageAdapter::with_backend(backend, Duration::ZERO)
    }

    #[tokio::test]
    async fn writes_reach_backend_when_available() {
        let backend = Arc::new(FlakyBackend::new());
        let adapter = adapter_with(backend.clone());

        adapter.hset("agents", "a1", &json!({"x": 1})).await.unwrap();
        assert_eq!(
            backend.inner.hget("agents", "a1").await.unwrap().as_deref(),
            Some(r#"{"x":1}"#)
        );
    }

    #[tokio::test]
    async fn writes_fall_back_when_backend_down() {
        let backend = Arc::new(FlakyBackend::new());
        let adapter = adapter_with(backend.clone());
        backend.set_down(true);

        // Probe fails, write goes to the fallback silently.
        adapter.hset("agents", "a1", &json!(1)).await.unwrap();
        assert_eq!(adapter.hget("agents", "a1").await.unwrap(), Some(json!(1)));

        // Backend never saw it.
        backend.set_down(false);
        assert!(backend.inner.hget("agents", "a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mid_write_failure_is_backend_transient() {
        // Probe succeeds, then the write itself fails: transient error,
        // fallback holds the value.
        struct FailsWrites {
            inner: MemoryBackend,
        }
        #[async_trait]
        impl KvBackend for FailsWrites {
            async fn hset(&self, _: &str, _: &str, _: &str) -> Result<()> {
                Err(Error::Storage("write refused".into()))
            }
            async fn hget(&self, bucket: &str, key: &str) -> Result<Option<String>> {
                self.inner.hget(bucket, key).await
            }
            async fn hkeys(&self, bucket: &str) -> Result<Vec<String>> {
                self.inner.hkeys(bucket).await
            }
            async fn hdel(&self, bucket: &str, key: &str) -> Result<bool> {
                self.inner.hdel(bucket, key).await
            }
            async fn h_exists(&self, bucket: &str, key: &str) -> Result<bool> {
                self.inner.h_exists(bucket, key).await
            }
            async fn ping(&self) -> Result<()> {
                Ok(())
            }
        }

        let adapter = StorageAdapter::with_backend(
            Arc::new(FailsWrites {
                inner: MemoryBackend::new(),
            }),
            Duration::ZERO,
        );
        let err = adapter.hset("b", "k", &json!(true)).await.unwrap_err();
        assert!(matches!(err, Error::BackendTransient(_)));
        // The fallback accepted the value.
        assert_eq!(adapter.hget("b", "k").await.unwrap(), Some(json!(true)));
    }

    #[tokio::test]
    async fn reads_prefer_backend_and_fall_through() {
        let backend = Arc::new(FlakyBackend::new());
        let adapter = adapter_with(backend.clone());

        // Value only in the backend.
        backend.inner.hset("b", "remote", "\"r\"").await.unwrap();
        assert_eq!(adapter.hget("b", "remote").await.unwrap(), Some(json!("r")));

        // Value written while down lands in the fallback; still readable
        // after the backend comes back.
        backend.set_down(true);
        adapter.hset("b", "local", &json!("l")).await.unwrap();
        backend.set_down(false);
        assert_eq!(adapter.hget("b", "local").await.unwrap(), Some(json!("l")));
    }

    #[tokio::test]
    async fn hkeys_merges_both_stores() {
        let backend = Arc::new(FlakyBackend::new());
        let adapter = adapter_with(backend.clone());

        backend.inner.hset("b", "remote", "1").await.unwrap();
        backend.set_down(true);
        adapter.hset("b", "local", &json!(2)).await.unwrap();
        backend.set_down(false);

        let mut keys = adapter.hkeys("b").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["local".to_string(), "remote".to_string()]);
    }

    #[tokio::test]
    async fn probe_ttl_throttles_reconnect() {
        let backend = Arc::new(FlakyBackend::new());
        backend.set_down(true);
        let adapter = StorageAdapter::with_backend(backend.clone(), Duration::from_secs(60));

        // First call probes and fails.
        adapter.hset("b", "k", &json!(1)).await.unwrap();
        // Backend recovers, but the cached verdict stands for 60s, so the
        // next write still lands in the fallback.
        backend.set_down(false);
        adapter.hset("b", "k2", &json!(2)).await.unwrap();
        assert!(backend.inner.hget("b", "k2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn single_key_forms_share_the_kv_bucket() {
        let adapter = StorageAdapter::memory_only();
        adapter.set("k", &json!({"v": 1})).await.unwrap();
        assert!(adapter.exists("k").await.unwrap());
        assert_eq!(adapter.get("k").await.unwrap(), Some(json!({"v": 1})));
        assert!(adapter.delete("k").await.unwrap());
        assert!(!adapter.exists("k").await.unwrap());
    }
}
