//! In-process publish/subscribe for registry mutations.
//!
//! Built on `tokio::sync::broadcast`: publishing never blocks, lagging
//! subscribers skip ahead (`RecvError::Lagged`) instead of stalling a
//! mutation, and subscribers hold plain receiver handles rather than a
//! callback back-reference into the registry.

use tokio::sync::broadcast;

/// Events on the `agent` topic. Broadcasts observe mutation order for each
/// agent; cross-agent ordering is unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Registered { agent_id: String },
    Updated { agent_id: String },
    Heartbeat { agent_id: String },
    Unregistered { agent_id: String },
}

impl AgentEvent {
    pub fn agent_id(&self) -> &str {
        match self {
            AgentEvent::Registered { agent_id }
            | AgentEvent::Updated { agent_id }
            | AgentEvent::Heartbeat { agent_id }
            | AgentEvent::Unregistered { agent_id } => agent_id,
        }
    }
}

/// Events on the `metrics` topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsEvent {
    pub agent_id: String,
}

pub struct NotificationBus {
    agent_tx: broadcast::Sender<AgentEvent>,
    metrics_tx: broadcast::Sender<MetricsEvent>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (agent_tx, _) = broadcast::channel(capacity);
        let (metrics_tx, _) = broadcast::channel(capacity);
        Self {
            agent_tx,
            metrics_tx,
        }
    }

    pub fn subscribe_agents(&self) -> broadcast::Receiver<AgentEvent> {
        self.agent_tx.subscribe()
    }

    pub fn subscribe_metrics(&self) -> broadcast::Receiver<MetricsEvent> {
        self.metrics_tx.subscribe()
    }

    /// Best-effort publish; an error just means nobody is listening.
    pub fn publish_agent(&self, event: AgentEvent) {
        let _ = self.agent_tx.send(event);
    }

    pub fn publish_metrics(&self, event: MetricsEvent) {
        let _ = self.metrics_tx.send(event);
    }
}
