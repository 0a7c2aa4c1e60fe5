//! The `KvBackend` trait defines the capability set every storage backend
//! implements (remote hash store, in-process memory, test doubles).

use async_trait::async_trait;

use arcp_domain::error::Result;

/// Bucket-namespaced hash operations. Values are opaque strings; encoding is
/// the caller's (adapter's) concern.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Set `bucket[key] = value`.
    async fn hset(&self, bucket: &str, key: &str, value: &str) -> Result<()>;

    /// Fetch `bucket[key]`.
    async fn hget(&self, bucket: &str, key: &str) -> Result<Option<String>>;

    /// All keys in `bucket`.
    async fn hkeys(&self, bucket: &str) -> Result<Vec<String>>;

    /// Delete `bucket[key]`; returns whether a value was present.
    async fn hdel(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Whether `bucket[key]` exists.
    async fn h_exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;
}
