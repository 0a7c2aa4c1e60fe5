//! Long-lived lifecycle tasks.
//!
//! The cleanup loop sweeps for stale agents at the configured interval. It
//! survives per-iteration errors and honors cancellation via the returned
//! handle being aborted (the gateway owns task lifetimes).

use std::sync::Arc;
use std::time::Duration;

use crate::registry::AgentRegistry;

/// Run the stale-agent sweep forever at `cleanup_interval`.
///
/// Spawn with `tokio::spawn(run_cleanup_loop(registry))`; abort the handle
/// to stop it.
pub async fn run_cleanup_loop(registry: Arc<AgentRegistry>) {
    let config = registry.config().clone();
    tracing::info!(
        interval_secs = config.cleanup_interval_secs,
        stale_threshold_secs = config.stale_threshold_secs(),
        "cleanup task started"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.cleanup_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match registry.cleanup_stale().await {
            Ok(0) => {}
            Ok(cleaned) => tracing::info!(cleaned, "stale agents removed"),
            Err(e) => tracing::warn!(error = %e, "cleanup sweep failed, will retry"),
        }
    }
}
