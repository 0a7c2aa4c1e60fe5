//! Read-only public surface: redacted discovery, public search, connection
//! forwarding, and service metadata. No authentication.

use axum::extract::{Json, Path, Query, State};
use serde::Deserialize;

use arcp_domain::error::Error;
use arcp_protocol::search::PublicSearchResponse;
use arcp_protocol::ws::Pagination;
use arcp_protocol::{AgentStatus, ListFilter, PublicAgentInfo, SearchRequest};

use crate::problem::{ApiError, ApiResult};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /public/discover
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Deserialize)]
pub struct DiscoverQuery {
    pub agent_type: Option<String>,
    /// Comma-separated capability tags; all must match.
    pub capabilities: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Alive agents only, redacted, offset-paginated.
pub async fn discover(
    State(state): State<AppState>,
    Query(query): Query<DiscoverQuery>,
) -> Json<serde_json::Value> {
    let filter = ListFilter {
        agent_type: query.agent_type,
        status: Some(AgentStatus::Alive),
        capabilities: query
            .capabilities
            .map(|raw| {
                raw.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    };

    let all: Vec<PublicAgentInfo> = state
        .registry
        .list(&filter)
        .iter()
        .map(|a| a.redacted())
        .collect();

    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).min(all.len());
    let end = (offset + limit).min(all.len());

    Json(serde_json::json!({
        "agents": &all[offset..end],
        "total": all.len(),
        "limit": limit,
        "offset": offset,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /public/search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Public semantic search; results carry only the redacted projection.
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Json<PublicSearchResponse>> {
    let results = state.registry.search(&req, &state.config.search).await?;
    let results: Vec<PublicAgentInfo> = results.iter().map(|a| a.redacted()).collect();
    Ok(Json(PublicSearchResponse {
        count: results.len(),
        results,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /public/agent/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<PublicAgentInfo>> {
    Ok(Json(state.registry.get(&agent_id)?.redacted()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /public/connect/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize, serde::Serialize)]
pub struct ConnectRequest {
    pub user_id: String,
    pub user_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<serde_json::Value>,
}

/// Forward a connection request to the target agent's own endpoint and
/// relay its response. Unreachable agents yield a 502 gateway error
/// through the shared Problem Details pipeline.
pub async fn connect(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(body): Json<ConnectRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if body.user_id.trim().is_empty() {
        return Err(ApiError(Error::Validation("user_id must not be empty".into())));
    }
    if !body.user_endpoint.starts_with("http://") && !body.user_endpoint.starts_with("https://") {
        return Err(ApiError(Error::Validation(
            "user_endpoint must be an http(s) URL".into(),
        )));
    }

    let agent = state.registry.get(&agent_id)?;
    if agent.status != AgentStatus::Alive {
        return Err(ApiError(Error::AgentNotFound(agent_id)));
    }

    match state
        .http
        .post(format!("{}/connect", agent.endpoint.trim_end_matches('/')))
        .json(&body)
        .send()
        .await
    {
        Ok(response) => {
            let payload = response
                .json::<serde_json::Value>()
                .await
                .unwrap_or_else(|_| serde_json::json!({ "status": "accepted" }));
            Ok(Json(payload))
        }
        Err(e) => {
            tracing::warn!(agent_id = %agent.agent_id, error = %e, "connect forward failed");
            Err(ApiError(Error::AgentUnreachable(agent.agent_id)))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /public/info / stats / agent_types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "arcp",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.uptime_seconds(),
        "allowed_agent_types": state.config.registry.allowed_agent_types,
    }))
}

pub async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.registry.stats();
    Json(serde_json::json!({
        "total_agents": stats.total_agents,
        "alive_agents": stats.alive_agents,
        "dead_agents": stats.dead_agents,
        "agent_types": stats.agent_types,
        "timestamp": chrono::Utc::now(),
    }))
}

pub async fn agent_types(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "registered": state.registry.agent_types(),
        "allowed": state.config.registry.allowed_agent_types,
    }))
}

// Re-exported for the WS discovery frames, which paginate the same way.
pub(crate) fn discovery_page(
    state: &AppState,
    page: usize,
    page_size: usize,
    agent_type: Option<String>,
) -> arcp_protocol::ws::DiscoveryPage {
    let filter = ListFilter {
        agent_type,
        status: Some(AgentStatus::Alive),
        capabilities: Vec::new(),
    };
    let all: Vec<PublicAgentInfo> = state
        .registry
        .list(&filter)
        .iter()
        .map(|a| a.redacted())
        .collect();
    let (pagination, start, end) = Pagination::slice(page, page_size, all.len());
    arcp_protocol::ws::DiscoveryPage {
        agents: all[start..end].to_vec(),
        pagination,
    }
}
