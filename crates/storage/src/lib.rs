//! Storage layer: bucket-namespaced hash operations over an optional remote
//! Redis backend with a transparent in-process fallback.
//!
//! The registry, rate limiter and session store depend only on the
//! [`StorageAdapter`]; which backend actually holds a value is an adapter
//! concern. Backend availability is probed lazily, cached with a TTL, and
//! reconnection after a failed probe is throttled by the same TTL.

pub mod adapter;
pub mod backend;
pub mod memory;
pub mod redis_backend;

pub use adapter::{StorageAdapter, StorageStatus};
pub use backend::KvBackend;
pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;

use std::sync::Arc;
use std::time::Duration;

use arcp_domain::config::StorageConfig;

/// Build the process-wide storage adapter from configuration.
///
/// An unset `REDIS_URL` yields a memory-only adapter; a set but unreachable
/// one yields an adapter that keeps probing on the configured interval.
pub fn create_adapter(config: &StorageConfig) -> Arc<StorageAdapter> {
    let probe_ttl = Duration::from_secs(config.health_check_interval_secs.max(1));
    match &config.redis_url {
        Some(url) => Arc::new(StorageAdapter::with_remote_url(url.clone(), probe_ttl)),
        None => Arc::new(StorageAdapter::memory_only()),
    }
}
