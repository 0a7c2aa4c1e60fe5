//! Agent endpoints: registration (enrollment phase 2), listing, lifecycle
//! and authenticated semantic search.

use axum::extract::{Json, Path, Query, State};
use serde::{Deserialize, Serialize};

use arcp_auth::permissions::AccessLevel;
use arcp_auth::{MintClaims, Role};
use arcp_domain::error::Error;
use arcp_protocol::{
    AgentInfo, AgentMetrics, AgentRegistration, AgentStatus, HeartbeatResponse, ListFilter,
    SearchRequest, SearchResponse,
};

use crate::guards::AgentGuard;
use crate::problem::{ApiError, ApiResult};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /agents/register
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub agent: AgentInfo,
    /// Permanent agent token minted on successful enrollment.
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Enrollment phase 2. Temp tokens must match the registration they were
/// minted for; admins may register on an agent's behalf.
pub async fn register(
    State(state): State<AppState>,
    guard: AgentGuard,
    Json(body): Json<AgentRegistration>,
) -> ApiResult<Json<RegistrationResponse>> {
    let claims = &guard.0.claims;

    let key_hash = if claims.temp_registration {
        // The temp token binds one enrollment; any mismatch is an
        // authentication failure, not a validation one.
        if claims.agent_id.as_deref() != Some(body.agent_id.as_str())
            || claims.agent_type.as_deref() != Some(body.agent_type.as_str())
        {
            return Err(ApiError(Error::AuthenticationFailed(
                "registration does not match the enrollment this token was issued for".into(),
            )));
        }
        claims.used_key_hash.clone()
    } else if claims.role.allows(AccessLevel::Admin) {
        None
    } else {
        return Err(ApiError(Error::InsufficientPermissions(
            "registration requires a temp registration token or an admin token".into(),
        )));
    };

    let agent_id = body.agent_id.clone();
    let (outcome, agent) = state.registry.register(body, key_hash).await?;
    tracing::debug!(agent_id = %agent_id, ?outcome, "registration handled");

    let (token, expires_in) = state.tokens.mint(MintClaims {
        sub: format!("agent:{agent_id}"),
        agent_id: Some(agent_id),
        role: Some(Role::Agent),
        scopes: vec!["agent".into()],
        ..MintClaims::default()
    })?;

    Ok(Json(RegistrationResponse {
        agent,
        access_token: token,
        token_type: "bearer".into(),
        expires_in,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /agents
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub agent_type: Option<String>,
    pub status: Option<AgentStatus>,
    /// Comma-separated capability tags; all must match.
    pub capabilities: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> ListFilter {
        ListFilter {
            agent_type: self.agent_type,
            status: self.status,
            capabilities: self
                .capabilities
                .map(|raw| {
                    raw.split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    _guard: AgentGuard,
    Query(query): Query<ListQuery>,
) -> Json<Vec<AgentInfo>> {
    Json(state.registry.list(&query.into_filter()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /agents/:id / DELETE /agents/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_agent(
    State(state): State<AppState>,
    _guard: AgentGuard,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<AgentInfo>> {
    Ok(Json(state.registry.get(&agent_id)?))
}

pub async fn unregister(
    State(state): State<AppState>,
    guard: AgentGuard,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !guard.may_manage(&agent_id) {
        return Err(ApiError(Error::InsufficientPermissions(
            "agents may only unregister themselves".into(),
        )));
    }
    state.registry.unregister(&agent_id).await?;
    Ok(Json(serde_json::json!({ "status": "unregistered" })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /agents/:id/heartbeat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn heartbeat(
    State(state): State<AppState>,
    guard: AgentGuard,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<HeartbeatResponse>> {
    if !guard.may_manage(&agent_id) {
        return Err(ApiError(Error::InsufficientPermissions(
            "agents may only heartbeat themselves".into(),
        )));
    }
    Ok(Json(state.registry.heartbeat(&agent_id).await?))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET|POST /agents/:id/metrics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_metrics(
    State(state): State<AppState>,
    _guard: AgentGuard,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Option<AgentMetrics>>> {
    Ok(Json(state.registry.get_metrics(&agent_id)?))
}

pub async fn update_metrics(
    State(state): State<AppState>,
    guard: AgentGuard,
    Path(agent_id): Path<String>,
    Json(partial): Json<serde_json::Value>,
) -> ApiResult<Json<AgentMetrics>> {
    if !guard.may_manage(&agent_id) {
        return Err(ApiError(Error::InsufficientPermissions(
            "agents may only report their own metrics".into(),
        )));
    }
    Ok(Json(state.registry.update_metrics(&agent_id, &partial).await?))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET|POST /agents/search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "q", alias = "query")]
    pub query: String,
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
    pub agent_type: Option<String>,
    pub capabilities: Option<String>,
    #[serde(default)]
    pub weighted: bool,
}

pub async fn search_post(
    State(state): State<AppState>,
    _guard: AgentGuard,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let results = state.registry.search(&req, &state.config.search).await?;
    Ok(Json(SearchResponse {
        count: results.len(),
        results,
    }))
}

pub async fn search_get(
    State(state): State<AppState>,
    _guard: AgentGuard,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let req = SearchRequest {
        query: query.query,
        top_k: query.top_k,
        min_similarity: query.min_similarity,
        agent_type: query.agent_type,
        capabilities: query
            .capabilities
            .map(|raw| {
                raw.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        weighted: query.weighted,
    };
    let results = state.registry.search(&req, &state.config.search).await?;
    Ok(Json(SearchResponse {
        count: results.len(),
        results,
    }))
}
