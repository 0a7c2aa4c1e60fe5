//! Token endpoints: admin minting, validation (always 200), and refresh.

use axum::extract::{Json, Query, State};
use serde::Deserialize;

use arcp_auth::{MintClaims, Role};
use arcp_domain::error::Error;
use arcp_protocol::{MintRequest, TokenResponse, ValidateResponse};

use crate::guards::{AdminGuard, AuthContext};
use crate::problem::{ApiError, ApiResult};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /tokens/mint (admin only)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn mint(
    State(state): State<AppState>,
    _guard: AdminGuard,
    Json(body): Json<MintRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let role = Role::parse(&body.role).ok_or_else(|| {
        ApiError(Error::Validation(format!(
            "unknown role \"{}\"",
            arcp_auth::sanitize_str(&body.role)
        )))
    })?;

    let (token, expires_in) = state.tokens.mint(MintClaims {
        sub: body.sub,
        agent_id: body.agent_id,
        role: Some(role),
        scopes: body.scopes,
        expire_minutes: body.expire_minutes,
        ..MintClaims::default()
    })?;

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".into(),
        expires_in,
        temp_registration: false,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /tokens/validate?token=…
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub token: String,
}

/// Always answers 200; validity is carried in the body.
pub async fn validate(
    State(state): State<AppState>,
    Query(query): Query<ValidateQuery>,
) -> Json<ValidateResponse> {
    match state.tokens.validate(&query.token) {
        Ok(claims) => Json(ValidateResponse {
            valid: true,
            payload: serde_json::to_value(&claims).ok(),
            error: None,
        }),
        Err(e) => Json(ValidateResponse {
            valid: false,
            payload: None,
            error: Some(arcp_auth::sanitize_str(&e.to_string())),
        }),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /tokens/refresh
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Re-mint the presented (valid, unexpired) bearer token.
pub async fn refresh(
    State(state): State<AppState>,
    context: AuthContext,
) -> ApiResult<Json<TokenResponse>> {
    let temp = context.claims.temp_registration;
    let (token, expires_in) = state.tokens.refresh(&context.token)?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".into(),
        expires_in,
        temp_registration: temp,
    }))
}
