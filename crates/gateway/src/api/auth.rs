//! Authentication endpoints: admin login, two-phase agent enrollment
//! (phase 1: temp token), logout, and session PIN management.

use axum::extract::{Json, State};
use axum::response::IntoResponse;

use arcp_auth::{constant_time_eq, sha256_hex, MintClaims, Role, TokenService};
use arcp_domain::error::Error;
use arcp_protocol::{LoginRequest, LoginResponse, SetPinRequest, TempTokenRequest, TokenResponse};

use crate::guards::{AdminGuard, AuthContext, ClientId, PinGuard};
use crate::problem::{ApiError, ApiResult};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /auth/login
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Admin credential login. Direct agent login through this endpoint is
/// rejected; agents enroll via `request_temp_token` + `/agents/register`.
/// Rate-limited on the `login` bucket before the credential store is
/// consulted.
pub async fn login(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    state
        .limiters
        .check(&state.limiters.login, &client_id)
        .await?
        .into_result()?;

    if body.agent_id.is_some() || body.agent_key.is_some() {
        // Not a credential failure, so it is not recorded against the
        // bucket; the enrollment flow is simply elsewhere.
        return Err(ApiError(Error::AuthenticationFailed(
            "agents must use the temp-token enrollment flow".into(),
        )));
    }

    let username = body.username.unwrap_or_default();
    let password = body.password.unwrap_or_default();

    // Both comparisons always run; neither username existence nor which
    // field was wrong is observable.
    let user_ok = constant_time_eq(&username, &state.config.auth.admin_username);
    let pass_ok = constant_time_eq(&password, &state.config.auth.admin_password);
    let ok = user_ok & pass_ok;

    state
        .limiters
        .record(&state.limiters.login, &client_id, ok)
        .await?;
    if !ok {
        return Err(ApiError(Error::AuthenticationFailed(
            "invalid credentials".into(),
        )));
    }

    let (token, expires_in) = state.tokens.mint(MintClaims {
        sub: username.clone(),
        role: Some(Role::Admin),
        scopes: vec!["admin".into()],
        ..MintClaims::default()
    })?;

    let token_ref = TokenService::token_ref(&token);
    state.sessions.create(&username, &client_id, &token_ref);
    tracing::info!(user = %username, "admin login");

    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "bearer".into(),
        expires_in,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /auth/agent/request_temp_token
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Enrollment phase 1: validate the pre-shared key and mint a temp token
/// bound to exactly this `agent_id`/`agent_type`/key.
pub async fn request_temp_token(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    Json(body): Json<TempTokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    state
        .limiters
        .check(&state.limiters.global, &client_id)
        .await?
        .into_result()?;

    if body.agent_id.trim().is_empty() {
        return Err(ApiError(Error::Validation("agent_id must not be empty".into())));
    }
    if !state
        .config
        .registry
        .allowed_agent_types
        .contains(&body.agent_type)
    {
        return Err(ApiError(Error::Validation(format!(
            "agent_type \"{}\" is not allowed",
            arcp_auth::sanitize_str(&body.agent_type)
        ))));
    }

    // Key validation: compare the presented key's digest against every
    // configured digest so timing does not reveal which (if any) matched.
    let presented = sha256_hex(&body.agent_key);
    let mut key_ok = false;
    for known in state.agent_key_hashes.iter() {
        key_ok |= constant_time_eq(&presented, known);
    }

    // One live agent per key, checked before minting anything.
    let binding_ok = match state.registry.get_agent_by_key(&presented) {
        Some(holder) => holder == body.agent_id,
        None => true,
    };

    let ok = key_ok && binding_ok;
    state
        .limiters
        .record(&state.limiters.global, &client_id, ok)
        .await?;
    if !key_ok {
        // Unknown key and bound key are indistinguishable to the caller.
        return Err(ApiError(Error::AuthenticationFailed(
            "agent key rejected".into(),
        )));
    }
    if !binding_ok {
        return Err(ApiError(Error::AuthenticationFailed(
            "agent key rejected".into(),
        )));
    }

    let (token, expires_in) = state.tokens.mint(MintClaims {
        sub: format!("agent:{}", body.agent_id),
        agent_id: Some(body.agent_id.clone()),
        role: Some(Role::Agent),
        scopes: vec!["register".into()],
        temp_registration: true,
        agent_type: Some(body.agent_type.clone()),
        used_key_hash: Some(presented),
        expire_minutes: None,
    })?;

    tracing::info!(agent_id = %body.agent_id, agent_type = %body.agent_type, "temp registration token minted");
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".into(),
        expires_in,
        temp_registration: true,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /auth/logout
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Invalidate the caller's admin session, if one exists. Agent tokens have
/// no session state; logging out is a no-op acknowledged all the same.
pub async fn logout(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    context: AuthContext,
) -> impl IntoResponse {
    let token_ref = TokenService::token_ref(&context.token);
    let session_key =
        arcp_auth::SessionStore::session_key(&context.claims.sub, &client_id, &token_ref);
    let removed = state.sessions.remove(&session_key);
    tracing::debug!(sub = %context.claims.sub, removed, "logout");
    Json(serde_json::json!({ "status": "logged_out" }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /auth/set_pin / POST /auth/verify_pin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bind a PIN to the caller's admin session. Setting the first PIN cannot
/// itself require one, so this stops at `AdminGuard`.
pub async fn set_pin(
    State(state): State<AppState>,
    guard: AdminGuard,
    Json(body): Json<SetPinRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state.sessions.set_pin(&guard.session_key, &body.pin)?;
    Ok(Json(serde_json::json!({ "status": "pin_set" })))
}

/// Verify the PIN supplied in the `x-pin` header against the caller's
/// session. `PinGuard` does the rate-limited verification; reaching the
/// handler body means it passed.
pub async fn verify_pin(_guard: PinGuard) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "pin_verified" }))
}
