//! Agent registry core: the authoritative in-memory state of all agents
//! (records, embeddings, metrics, info hashes, key bindings) with
//! write-through to the storage adapter, per-agent mutation serialization,
//! lifecycle management, semantic search, and the notification bus.

pub mod bus;
pub mod info_hash;
pub mod lifecycle;
pub mod locks;
pub mod registry;
pub mod search;

pub use bus::{AgentEvent, MetricsEvent, NotificationBus};
pub use info_hash::info_hash;
pub use lifecycle::run_cleanup_loop;
pub use locks::AgentLockMap;
pub use registry::{AgentRegistry, RegistrationOutcome, RegistryStats};
