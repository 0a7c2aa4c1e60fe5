//! RFC 9457 Problem Details bodies with stable `urn:arcp:error:*` type URIs.

use serde::{Deserialize, Serialize};

use arcp_domain::error::Error;

/// Content type for every error response.
pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// Stable error-type URI, e.g. `urn:arcp:error:agent-not-found`.
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Seconds to wait before retrying; only on `rate-limit-exceeded`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<f64>,
}

impl ProblemDetails {
    pub fn new(kind: &str, status: u16, title: &str, detail: Option<String>) -> Self {
        Self {
            type_uri: format!("urn:arcp:error:{kind}"),
            title: title.into(),
            status,
            detail,
            instance: None,
            retry_after: None,
        }
    }

    /// HTTP status code for each error kind of the shared taxonomy.
    pub fn status_for_kind(kind: &str) -> u16 {
        match kind {
            "authentication-failed" | "token-validation-error" => 401,
            "insufficient-permissions" => 403,
            "agent-not-found" => 404,
            "agent-registration-error" | "pin-required" => 400,
            "agent-key-in-use" => 409,
            "validation-error" => 422,
            "rate-limit-exceeded" => 429,
            "agent-unreachable" => 502,
            _ => 500,
        }
    }

    fn title_for_kind(kind: &str) -> &'static str {
        match kind {
            "authentication-failed" => "Authentication Failed",
            "insufficient-permissions" => "Insufficient Permissions",
            "agent-not-found" => "Agent Not Found",
            "agent-unreachable" => "Agent Unreachable",
            "agent-registration-error" => "Agent Registration Error",
            "agent-key-in-use" => "Agent Key In Use",
            "token-validation-error" => "Token Validation Error",
            "validation-error" => "Validation Error",
            "rate-limit-exceeded" => "Rate Limit Exceeded",
            "pin-required" => "PIN Required",
            "configuration-error" => "Configuration Error",
            _ => "Internal Server Error",
        }
    }
}

impl From<&Error> for ProblemDetails {
    fn from(err: &Error) -> Self {
        let kind = err.kind();
        let status = Self::status_for_kind(kind);
        // Internal kinds never leak detail to clients.
        let detail = match err {
            Error::Storage(_)
            | Error::BackendTransient(_)
            | Error::Embedding(_)
            | Error::Http(_)
            | Error::Timeout(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Internal(_) => None,
            other => Some(other.to_string()),
        };
        let mut problem = Self::new(kind, status, Self::title_for_kind(kind), detail);
        if let Error::RateLimited { retry_after, .. } = err {
            problem.retry_after = Some(*retry_after);
        }
        problem
    }
}
