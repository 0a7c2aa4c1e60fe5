//! Request guards — axum extractors enforcing the permission hierarchy.
//!
//! Handlers opt in by adding a guard to their parameter list:
//! `AgentGuard` (agent or admin token), `AdminGuard` (admin token **and** a
//! live session bound to this client's fingerprint and token), `PinGuard`
//! (admin session plus a verified PIN header for elevated operations).

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::net::SocketAddr;

use arcp_auth::fingerprint::ClientSignals;
use arcp_auth::permissions::{temp_registration_allowed, AccessLevel};
use arcp_auth::{client_identifier, SessionStore, TokenClaims, TokenService};
use arcp_domain::error::Error;

use crate::problem::ApiError;
use crate::state::AppState;

/// Header carrying the PIN proof for elevated admin operations.
pub const PIN_HEADER: &str = "x-pin";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Compose the client fingerprint from network and header signals.
pub fn fingerprint_of(parts: &Parts) -> String {
    let forwarded = header(parts, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from);
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string());
    let ip = forwarded.or(peer);

    client_identifier(&ClientSignals {
        ip: ip.as_deref(),
        user_agent: header(parts, "user-agent"),
        accept: header(parts, "accept"),
        accept_language: header(parts, "accept-language"),
        accept_encoding: header(parts, "accept-encoding"),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ClientId
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The rate-limit identifier composite for this request. Never fails.
pub struct ClientId(pub String);

#[async_trait]
impl FromRequestParts<AppState> for ClientId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientId(fingerprint_of(parts)))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AuthContext
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A validated bearer token. Rejections never distinguish a missing header
/// from a malformed or expired token.
pub struct AuthContext {
    pub claims: TokenClaims,
    pub token: String,
}

fn auth_failed() -> ApiError {
    ApiError(Error::AuthenticationFailed(
        "missing or invalid credentials".into(),
    ))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = header(parts, "authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(auth_failed)?
            .to_string();

        let claims = state.tokens.validate(&token).map_err(|_| auth_failed())?;

        // Temp-registration tokens are confined to the registration
        // endpoint.
        if claims.temp_registration && !temp_registration_allowed(parts.uri.path()) {
            return Err(ApiError(Error::InsufficientPermissions(
                "temporary registration token is limited to agent registration".into(),
            )));
        }

        Ok(AuthContext { claims, token })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AgentGuard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Requires the `agent` access level (agent or admin role).
pub struct AgentGuard(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for AgentGuard {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let context = AuthContext::from_request_parts(parts, state).await?;
        if !context.claims.role.allows(AccessLevel::Agent) {
            return Err(ApiError(Error::InsufficientPermissions(
                "agent access required".into(),
            )));
        }
        Ok(AgentGuard(context))
    }
}

impl AgentGuard {
    /// Whether this caller may operate on `agent_id`'s resources: admins
    /// always, agents only on their own record.
    pub fn may_manage(&self, agent_id: &str) -> bool {
        self.0.claims.role.allows(AccessLevel::Admin)
            || self.0.claims.agent_id.as_deref() == Some(agent_id)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AdminGuard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Requires the `admin` access level and a live session bound to this
/// client's fingerprint and token reference. A bare admin token without a
/// session is an authentication failure, not a permission one — a token
/// alone is not proof.
pub struct AdminGuard {
    pub context: AuthContext,
    pub session_key: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let context = AuthContext::from_request_parts(parts, state).await?;
        if !context.claims.role.allows(AccessLevel::Admin) {
            return Err(ApiError(Error::InsufficientPermissions(
                "admin access required".into(),
            )));
        }

        let fingerprint = fingerprint_of(parts);
        let token_ref = TokenService::token_ref(&context.token);
        let session_key =
            SessionStore::session_key(&context.claims.sub, &fingerprint, &token_ref);
        if state.sessions.touch(&session_key).is_none() {
            return Err(ApiError(Error::AuthenticationFailed(
                "no active admin session for this client".into(),
            )));
        }

        Ok(AdminGuard {
            context,
            session_key,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PinGuard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `AdminGuard` plus a verified PIN header. The PIN annotates this request
/// only; nothing about the token changes.
pub struct PinGuard {
    pub admin: AdminGuard,
}

#[async_trait]
impl FromRequestParts<AppState> for PinGuard {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let admin = AdminGuard::from_request_parts(parts, state).await?;
        let identifier = fingerprint_of(parts);

        state
            .limiters
            .check(&state.limiters.pin, &identifier)
            .await?
            .into_result()?;

        let Some(pin) = header(parts, PIN_HEADER) else {
            return Err(ApiError(Error::PinRequired(
                format!("{PIN_HEADER} header required for this operation"),
            )));
        };

        let verified = state.sessions.verify_pin(&admin.session_key, pin)?;
        state
            .limiters
            .record(&state.limiters.pin, &identifier, verified)
            .await?;
        if !verified {
            return Err(ApiError(Error::AuthenticationFailed(
                "PIN verification failed".into(),
            )));
        }

        Ok(PinGuard { admin })
    }
}
