//! Authentication and token endpoint DTOs.

use serde::{Deserialize, Serialize};

/// `POST /auth/login` body. Admin logins carry `username`/`password`; the
/// agent-shaped fields exist only so the handler can *reject* direct agent
/// logins explicitly (agents must use the two-phase enrollment path).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until expiry.
    pub expires_in: u64,
}

/// `POST /auth/agent/request_temp_token` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempTokenRequest {
    pub agent_id: String,
    pub agent_type: String,
    pub agent_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub temp_registration: bool,
}

/// `POST /tokens/mint` body (admin only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintRequest {
    pub sub: String,
    pub role: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_minutes: Option<u64>,
}

/// `POST /tokens/validate` response — always served with status 200.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPinRequest {
    pub pin: String,
}
