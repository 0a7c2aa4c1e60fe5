mod auth;
mod embedding;
mod registry;
mod search;
mod server;
mod storage;

pub use auth::*;
pub use embedding::*;
pub use registry::*;
pub use search::*;
pub use server::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Complete server configuration, assembled from environment variables at
/// startup. Every knob has a deployment-stable env key; see the per-section
/// structs for the key names.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArcpConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

// ── env helpers ─────────────────────────────────────────────────────

pub(crate) fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env_str(key).map(|v| v.parse::<T>()) {
        Some(Ok(v)) => v,
        Some(Err(_)) => {
            tracing::warn!(key, "unparseable value, using default");
            default
        }
        None => default,
    }
}

pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    match env_str(key).as_deref() {
        Some("1") | Some("true") | Some("TRUE") | Some("yes") => true,
        Some("0") | Some("false") | Some("FALSE") | Some("no") => false,
        Some(other) => {
            tracing::warn!(key, value = other, "unrecognized boolean, using default");
            default
        }
        None => default,
    }
}

pub(crate) fn env_list(key: &str) -> Vec<String> {
    env_str(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

fn issue(severity: ConfigSeverity, field: &str, message: impl Into<String>) -> ConfigIssue {
    ConfigIssue {
        severity,
        field: field.into(),
        message: message.into(),
    }
}

impl ArcpConfig {
    /// Assemble the configuration from the process environment.
    ///
    /// Fails fast with `Error::Config` when a required key is missing or an
    /// `Error`-severity validation issue is present, so a misconfigured
    /// server never binds its listener.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            server: ServerConfig::from_env(),
            auth: AuthConfig::from_env(),
            registry: RegistryConfig::from_env(),
            storage: StorageConfig::from_env(),
            embedding: EmbeddingConfig::from_env(),
            search: SearchConfig::from_env(),
        };

        let issues = config.validate();
        for i in &issues {
            match i.severity {
                ConfigSeverity::Warning => tracing::warn!("config: {i}"),
                ConfigSeverity::Error => tracing::error!("config: {i}"),
            }
        }
        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .collect();
        if !errors.is_empty() {
            return Err(Error::Config(format!(
                "{} configuration error(s), first: {}",
                errors.len(),
                errors[0]
            )));
        }
        Ok(config)
    }

    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        use ConfigSeverity::{Error, Warning};
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(issue(Error, "ARCP_PORT", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            issues.push(issue(Error, "ARCP_HOST", "host must not be empty"));
        }

        // JWT secret is the one key with no sane default.
        if self.auth.jwt_secret.is_empty() {
            issues.push(issue(Error, "JWT_SECRET", "required, no default"));
        } else if self.auth.jwt_secret.len() < 16 {
            issues.push(issue(
                Error,
                "JWT_SECRET",
                "must be at least 16 characters",
            ));
        }
        if self.auth.jwt_algorithm != "HS256" {
            issues.push(issue(
                Error,
                "JWT_ALGORITHM",
                format!("only HS256 is supported (got \"{}\")", self.auth.jwt_algorithm),
            ));
        }
        if self.auth.admin_username.is_empty() {
            issues.push(issue(Error, "ADMIN_USERNAME", "required, no default"));
        }
        if self.auth.admin_password.is_empty() {
            issues.push(issue(Error, "ADMIN_PASSWORD", "required, no default"));
        }
        if self.auth.agent_keys.is_empty() {
            issues.push(issue(
                Warning,
                "AGENT_KEYS",
                "empty allow-list — agent enrollment is disabled",
            ));
        }
        if self.registry.allowed_agent_types.is_empty() {
            issues.push(issue(
                Error,
                "ALLOWED_AGENT_TYPES",
                "at least one agent type is required",
            ));
        }

        if let Some(url) = &self.storage.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                issues.push(issue(
                    Error,
                    "REDIS_URL",
                    format!("must start with redis:// or rediss:// (got \"{url}\")"),
                ));
            }
        }

        if let Some(endpoint) = &self.embedding.azure_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                issues.push(issue(
                    Error,
                    "AZURE_OPENAI_ENDPOINT",
                    format!("must start with http:// or https:// (got \"{endpoint}\")"),
                ));
            }
            if self.embedding.azure_api_key.is_none() {
                issues.push(issue(
                    Error,
                    "AZURE_OPENAI_API_KEY",
                    "required when AZURE_OPENAI_ENDPOINT is set",
                ));
            }
        }

        if self.search.min_similarity < 0.0 || self.search.min_similarity > 1.0 {
            issues.push(issue(
                Error,
                "VECTOR_SEARCH_MIN_SIMILARITY",
                "must be within [0, 1]",
            ));
        }
        if self.search.top_k == 0 || self.search.top_k > self.search.max_top_k {
            issues.push(issue(
                Error,
                "VECTOR_SEARCH_TOP_K",
                format!("must be within 1..={}", self.search.max_top_k),
            ));
        }

        if self.server.cors_origins.len() == 1 && self.server.cors_origins[0] == "*" {
            issues.push(issue(
                Warning,
                "ALLOWED_ORIGINS",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if self.server.rate_limit_enabled {
            if self.server.rate_limit_rps == 0 {
                issues.push(issue(Error, "RATE_LIMIT_RPS", "must be greater than 0"));
            }
            if self.server.rate_limit_burst == 0 {
                issues.push(issue(Error, "RATE_LIMIT_BURST", "must be greater than 0"));
            }
        }

        issues
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: build a minimal valid config without touching the env.
    fn valid_config() -> ArcpConfig {
        ArcpConfig {
            auth: AuthConfig {
                jwt_secret: "0123456789abcdef0123".into(),
                admin_username: "admin".into(),
                admin_password: "correct horse".into(),
                agent_keys: vec!["key-1".into()],
                ..AuthConfig::default()
            },
            ..ArcpConfig::default()
        }
    }

    /// Helper: find the first issue matching a field prefix.
    fn find_issue<'a>(issues: &'a [ConfigIssue], field: &str) -> Option<&'a ConfigIssue> {
        issues.iter().find(|i| i.field.starts_with(field))
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn missing_jwt_secret_is_error() {
        let mut cfg = valid_config();
        cfg.auth.jwt_secret = String::new();
        let i = valid_config_issues_for(&cfg, "JWT_SECRET");
        assert_eq!(i.severity, ConfigSeverity::Error);
    }

    #[test]
    fn short_jwt_secret_is_error() {
        let mut cfg = valid_config();
        cfg.auth.jwt_secret = "short".into();
        let i = valid_config_issues_for(&cfg, "JWT_SECRET");
        assert!(i.message.contains("16"));
    }

    #[test]
    fn unsupported_jwt_algorithm_is_error() {
        let mut cfg = valid_config();
        cfg.auth.jwt_algorithm = "RS256".into();
        let i = valid_config_issues_for(&cfg, "JWT_ALGORITHM");
        assert_eq!(i.severity, ConfigSeverity::Error);
    }

    #[test]
    fn missing_admin_credentials_are_errors() {
        let mut cfg = valid_config();
        cfg.auth.admin_username = String::new();
        cfg.auth.admin_password = String::new();
        let issues = cfg.validate();
        assert!(find_issue(&issues, "ADMIN_USERNAME").is_some());
        assert!(find_issue(&issues, "ADMIN_PASSWORD").is_some());
    }

    #[test]
    fn empty_agent_keys_is_only_a_warning() {
        let mut cfg = valid_config();
        cfg.auth.agent_keys.clear();
        let i = valid_config_issues_for(&cfg, "AGENT_KEYS");
        assert_eq!(i.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn bad_redis_scheme_is_error() {
        let mut cfg = valid_config();
        cfg.storage.redis_url = Some("http://localhost:6379".into());
        let i = valid_config_issues_for(&cfg, "REDIS_URL");
        assert!(i.message.contains("redis://"));
    }

    #[test]
    fn azure_endpoint_without_key_is_error() {
        let mut cfg = valid_config();
        cfg.embedding.azure_endpoint = Some("https://example.openai.azure.com".into());
        cfg.embedding.azure_api_key = None;
        let i = valid_config_issues_for(&cfg, "AZURE_OPENAI_API_KEY");
        assert_eq!(i.severity, ConfigSeverity::Error);
    }

    #[test]
    fn out_of_range_min_similarity_is_error() {
        let mut cfg = valid_config();
        cfg.search.min_similarity = 1.5;
        let i = valid_config_issues_for(&cfg, "VECTOR_SEARCH_MIN_SIMILARITY");
        assert_eq!(i.severity, ConfigSeverity::Error);
    }

    #[test]
    fn top_k_above_max_is_error() {
        let mut cfg = valid_config();
        cfg.search.top_k = cfg.search.max_top_k + 1;
        let i = valid_config_issues_for(&cfg, "VECTOR_SEARCH_TOP_K");
        assert_eq!(i.severity, ConfigSeverity::Error);
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = valid_config();
        cfg.server.cors_origins = vec!["*".into()];
        let i = valid_config_issues_for(&cfg, "ALLOWED_ORIGINS");
        assert_eq!(i.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn heartbeat_and_cleanup_are_clamped() {
        let reg = RegistryConfig {
            heartbeat_timeout_secs: 1,
            cleanup_interval_secs: 0,
            ..RegistryConfig::default()
        };
        assert_eq!(reg.clamped().heartbeat_timeout_secs, 10);
        assert_eq!(reg.clamped().cleanup_interval_secs, 10);
    }

    #[test]
    fn issue_display_format() {
        let i = ConfigIssue {
            severity: ConfigSeverity::Error,
            field: "ARCP_PORT".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(format!("{i}"), "[ERROR] ARCP_PORT: port must be greater than 0");
    }

    fn valid_config_issues_for(cfg: &ArcpConfig, field: &str) -> ConfigIssue {
        let issues = cfg.validate();
        find_issue(&issues, field)
            .unwrap_or_else(|| panic!("expected issue for {field}, got {issues:?}"))
            .clone()
    }
}
