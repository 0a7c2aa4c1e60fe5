//! Per-agent mutation serialization.
//!
//! Every operation that mutates a single `agent_id` (register, heartbeat,
//! metrics update, unregister) holds that agent's permit for its duration,
//! so mutations cannot interleave partially. Reads never take these locks;
//! they work off snapshot views.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Each agent id maps to a `Semaphore(1)`; the permit is the write lock.
pub struct AgentLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for AgentLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the write lock for an agent; auto-releases on drop.
    pub async fn acquire(&self, agent_id: &str) -> OwnedSemaphorePermit {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(agent_id.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        sem.acquire_owned()
            .await
            .expect("agent lock semaphore never closes")
    }

    /// Drop lock entries that nobody currently holds.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| sem.available_permits() == 0);
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_acquire_release() {
        let map = AgentLockMap::new();
        let p1 = map.acquire("a1").await;
        drop(p1);
        let p2 = map.acquire("a1").await;
        drop(p2);
    }

    #[tokio::test]
    async fn different_agents_do_not_contend() {
        let map = AgentLockMap::new();
        let _p1 = map.acquire("a1").await;
        let _p2 = map.acquire("a2").await;
        assert_eq!(map.len(), 2);
    }

    #[tokio::test]
    async fn same_agent_serializes() {
        let map = Arc::new(AgentLockMap::new());
        let p1 = map.acquire("a1").await;

        let map2 = map.clone();
        let waiter = tokio::spawn(async move {
            let _p = map2.acquire("a1").await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(p1);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let map = AgentLockMap::new();
        let _held = map.acquire("busy").await;
        {
            let _released = map.acquire("idle").await;
        }
        map.prune_idle();
        assert_eq!(map.len(), 1);
    }
}
