//! Health probes. `/health` never fails; it reports `degraded` when a
//! configured dependency is unavailable.

use axum::extract::{Json, State};

use crate::guards::AdminGuard;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let storage = state.storage.status().await;
    let embeddings_available = state.registry.embedding_provider().is_available();

    let degraded = storage.backend_configured && !storage.backend_available;
    let status = if degraded { "degraded" } else { "healthy" };

    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.uptime_seconds(),
        "storage": {
            "backend_configured": storage.backend_configured,
            "backend_available": storage.backend_available,
        },
        "ai_services": {
            "embeddings_available": embeddings_available,
        },
    }))
}

pub async fn health_detailed(
    State(state): State<AppState>,
    _guard: AdminGuard,
) -> Json<serde_json::Value> {
    let storage = state.storage.status().await;
    let stats = state.registry.stats();
    let registry_config = state.registry.config();

    Json(serde_json::json!({
        "status": if storage.backend_configured && !storage.backend_available { "degraded" } else { "healthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.uptime_seconds(),
        "storage": {
            "backend_configured": storage.backend_configured,
            "backend_available": storage.backend_available,
        },
        "ai_services": {
            "embeddings_available": state.registry.embedding_provider().is_available(),
            "embedding_dimensions": state.registry.embedding_provider().dimensions(),
        },
        "registry": {
            "total_agents": stats.total_agents,
            "alive_agents": stats.alive_agents,
            "dead_agents": stats.dead_agents,
            "heartbeat_timeout_secs": registry_config.heartbeat_timeout_secs,
            "cleanup_interval_secs": registry_config.cleanup_interval_secs,
        },
        "sessions": {
            "active": state.sessions.len(),
        },
        "rate_limiting": {
            "enabled": state.limiters.enabled(),
        },
    }))
}
