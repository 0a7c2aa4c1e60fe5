//! Command-line interface for the `arcpd` binary.

use clap::{Parser, Subcommand};

use arcp_domain::config::ArcpConfig;

#[derive(Parser)]
#[command(name = "arcpd", version, about = "ARCP — Agent Registry & Control Protocol server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the server (default).
    Serve,
    /// Configuration helpers.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version.
    Version,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Validate the environment-derived configuration and exit non-zero on
    /// errors.
    Validate,
    /// Print the effective configuration with secrets redacted.
    Show,
}

/// `config validate`: report all issues; true when no errors.
pub fn validate() -> bool {
    match ArcpConfig::from_env() {
        Ok(_) => {
            println!("configuration OK");
            true
        }
        Err(e) => {
            eprintln!("{e}");
            false
        }
    }
}

/// `config show`: effective configuration with secret material redacted.
pub fn show() {
    // Validation is intentionally skipped here so a partially configured
    // environment can still be inspected.
    let config = ArcpConfig {
        server: arcp_domain::config::ServerConfig::from_env(),
        auth: arcp_domain::config::AuthConfig::from_env(),
        registry: arcp_domain::config::RegistryConfig::from_env(),
        storage: arcp_domain::config::StorageConfig::from_env(),
        embedding: arcp_domain::config::EmbeddingConfig::from_env(),
        search: arcp_domain::config::SearchConfig::from_env(),
    };
    let mut value = serde_json::to_value(&config).unwrap_or_default();
    for path in [
        ("auth", "jwt_secret"),
        ("auth", "admin_password"),
        ("embedding", "azure_api_key"),
    ] {
        if let Some(field) = value
            .get_mut(path.0)
            .and_then(|section| section.get_mut(path.1))
        {
            if !field.is_null() {
                *field = serde_json::json!("<redacted>");
            }
        }
    }
    if let Some(keys) = value.get_mut("auth").and_then(|a| a.get_mut("agent_keys")) {
        if let Some(count) = keys.as_array().map(|k| k.len()) {
            *keys = serde_json::json!(format!("<{count} key(s) redacted>"));
        }
    }
    println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
}
