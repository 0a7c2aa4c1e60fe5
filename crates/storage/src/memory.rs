//! In-process fallback backend.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use arcp_domain::error::Result;

use crate::backend::KvBackend;

/// `map[bucket] → map[key] → value`, protected by a single mutex. Operations
/// are short and never await while holding the lock.
#[derive(Default)]
pub struct MemoryBackend {
    buckets: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn hset(&self, bucket: &str, key: &str, value: &str) -> Result<()> {
        self.buckets
            .lock()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn hget(&self, bucket: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .buckets
            .lock()
            .get(bucket)
            .and_then(|b| b.get(key).cloned()))
    }

    async fn hkeys(&self, bucket: &str) -> Result<Vec<String>> {
        Ok(self
            .buckets
            .lock()
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn hdel(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self
            .buckets
            .lock()
            .get_mut(bucket)
            .map(|b| b.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn h_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self
            .buckets
            .lock()
            .get(bucket)
            .map(|b| b.contains_key(key))
            .unwrap_or(false))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_ops_round_trip() {
        let backend = MemoryBackend::new();
        backend.hset("agents", "a1", "{}").await.unwrap();

        assert_eq!(backend.hget("agents", "a1").await.unwrap().as_deref(), Some("{}"));
        assert!(backend.h_exists("agents", "a1").await.unwrap());
        assert_eq!(backend.hkeys("agents").await.unwrap(), vec!["a1".to_string()]);

        assert!(backend.hdel("agents", "a1").await.unwrap());
        assert!(!backend.hdel("agents", "a1").await.unwrap());
        assert!(backend.hget("agents", "a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn buckets_are_isolated() {
        let backend = MemoryBackend::new();
        backend.hset("a", "k", "1").await.unwrap();
        backend.hset("b", "k", "2").await.unwrap();
        assert_eq!(backend.hget("a", "k").await.unwrap().as_deref(), Some("1"));
        assert_eq!(backend.hget("b", "k").await.unwrap().as_deref(), Some("2"));
    }
}
