pub mod agents;
pub mod auth;
pub mod health;
pub mod public;
pub mod tokens;
pub mod ws;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Authorization is enforced per handler through the extractor guards in
/// [`crate::guards`]; routes with no guard are the public surface.
pub fn router() -> Router<AppState> {
    Router::new()
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/agent/request_temp_token", post(auth::request_temp_token))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/set_pin", post(auth::set_pin))
        .route("/auth/verify_pin", post(auth::verify_pin))
        // Tokens
        .route("/tokens/mint", post(tokens::mint))
        .route("/tokens/validate", post(tokens::validate))
        .route("/tokens/refresh", post(tokens::refresh))
        // Agents (agent or admin)
        .route("/agents/register", post(agents::register))
        .route("/agents", get(agents::list))
        .route("/agents/search", get(agents::search_get).post(agents::search_post))
        .route("/agents/:id", get(agents::get_agent))
        .route("/agents/:id", delete(agents::unregister))
        .route("/agents/:id/heartbeat", post(agents::heartbeat))
        .route(
            "/agents/:id/metrics",
            get(agents::get_metrics).post(agents::update_metrics),
        )
        // Public surface (no auth)
        .route("/public/discover", get(public::discover))
        .route("/public/search", post(public::search))
        .route("/public/agent/:id", get(public::get_agent))
        .route("/public/connect/:id", post(public::connect))
        .route("/public/info", get(public::info))
        .route("/public/stats", get(public::stats))
        .route("/public/agent_types", get(public::agent_types))
        .route("/public/ws", get(ws::public_ws))
        // Health
        .route("/health", get(health::health))
        .route("/health/detailed", get(health::health_detailed))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
