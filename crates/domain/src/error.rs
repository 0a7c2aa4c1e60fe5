/// Shared error type used across all ARCP crates.
///
/// The gateway maps each variant onto a Problem Details response; library
/// crates only ever construct and propagate these.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("storage: {0}")]
    Storage(String),

    /// A write reached the in-process fallback but not the remote backend.
    /// Callers treat this as success with degraded durability.
    #[error("storage backend transient: {0}")]
    BackendTransient(String),

    #[error("embedding provider: {0}")]
    Embedding(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("PIN required: {0}")]
    PinRequired(String),

    #[error("token validation: {0}")]
    TokenValidation(String),

    #[error("rate limit exceeded: {detail}")]
    RateLimited { retry_after: f64, detail: String },

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// The target agent's endpoint did not answer a forwarded request.
    /// Carries the `agent_id`; surfaced as a gateway error.
    #[error("agent endpoint unreachable: {0}")]
    AgentUnreachable(String),

    #[error("agent registration: {0}")]
    AgentRegistration(String),

    /// The presented agent key is already bound to another live agent.
    /// Carries the `agent_id` holding the binding.
    #[error("agent key is already in use by agent: {0}")]
    AgentKeyInUse(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable short kind tag, shared with the Problem Details `type` URI.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::AuthenticationFailed(_) => "authentication-failed",
            Error::InsufficientPermissions(_) => "insufficient-permissions",
            Error::PinRequired(_) => "pin-required",
            Error::TokenValidation(_) => "token-validation-error",
            Error::RateLimited { .. } => "rate-limit-exceeded",
            Error::AgentNotFound(_) => "agent-not-found",
            Error::AgentUnreachable(_) => "agent-unreachable",
            Error::AgentRegistration(_) => "agent-registration-error",
            Error::AgentKeyInUse(_) => "agent-key-in-use",
            Error::Validation(_) => "validation-error",
            Error::Config(_) => "configuration-error",
            _ => "internal-error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(
            Error::AuthenticationFailed("x".into()).kind(),
            "authentication-failed"
        );
        assert_eq!(Error::AgentKeyInUse("a1".into()).kind(), "agent-key-in-use");
        assert_eq!(
            Error::AgentUnreachable("sec-1".into()).kind(),
            "agent-unreachable"
        );
        assert_eq!(
            Error::RateLimited {
                retry_after: 60.0,
                detail: "locked".into()
            }
            .kind(),
            "rate-limit-exceeded"
        );
        assert_eq!(Error::Storage("down".into()).kind(), "internal-error");
    }

    #[test]
    fn key_in_use_display_names_the_holder() {
        let err = Error::AgentKeyInUse("demo-agent-001".into());
        assert!(err.to_string().contains("demo-agent-001"));
        assert!(err.to_string().contains("already in use"));
    }
}
