use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use chrono::Utc;
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use arcp_auth::{sha256_hex, RateLimiters, SessionStore, TokenService};
use arcp_domain::config::ArcpConfig;
use arcp_gateway::api;
use arcp_gateway::cli::{Cli, Command, ConfigCommand};
use arcp_gateway::state::AppState;
use arcp_registry::AgentRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            run_server().await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            if !arcp_gateway::cli::validate() {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            arcp_gateway::cli::show();
            Ok(())
        }
        Some(Command::Version) => {
            println!("arcpd {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,arcp_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server() -> anyhow::Result<()> {
    tracing::info!("ARCP starting");

    // ── Configuration (fails fast on missing required keys) ──────────
    let config = Arc::new(ArcpConfig::from_env().context("loading configuration")?);

    // ── Storage adapter ──────────────────────────────────────────────
    let storage = arcp_storage::create_adapter(&config.storage);
    tracing::info!(
        backend_configured = config.storage.redis_url.is_some(),
        "storage adapter ready"
    );

    // ── Embedding provider ───────────────────────────────────────────
    let embeddings = arcp_embeddings::create_provider(&config.embedding)
        .context("initializing embedding provider")?;

    // ── Registry core ────────────────────────────────────────────────
    let registry = Arc::new(AgentRegistry::new(
        storage.clone(),
        embeddings,
        config.registry.clone(),
    ));
    match registry.hydrate().await {
        Ok(0) => {}
        Ok(restored) => tracing::info!(restored, "registry state restored from storage"),
        Err(e) => tracing::warn!(error = %e, "registry hydration failed, starting empty"),
    }

    // ── Auth services ────────────────────────────────────────────────
    let tokens = Arc::new(TokenService::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expire_minutes,
    ));
    let sessions = Arc::new(SessionStore::new(
        config.auth.session_timeout_minutes,
        config.auth.pin_min_len,
    ));
    let limiters = Arc::new(RateLimiters::new(
        storage.clone(),
        config.server.rate_limit_enabled,
    ));
    let agent_key_hashes = Arc::new(
        config
            .auth
            .agent_keys
            .iter()
            .map(|k| sha256_hex(k))
            .collect::<Vec<_>>(),
    );
    tracing::info!(
        agent_keys = agent_key_hashes.len(),
        rate_limiting = config.server.rate_limit_enabled,
        "auth services ready"
    );

    // ── Outbound HTTP client (connect forwarding) ────────────────────
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .context("building outbound HTTP client")?;

    let state = AppState {
        config: config.clone(),
        storage,
        registry: registry.clone(),
        tokens,
        sessions: sessions.clone(),
        limiters: limiters.clone(),
        agent_key_hashes,
        http,
        started_at: Utc::now(),
    };

    // ── Stale-agent cleanup loop ─────────────────────────────────────
    tokio::spawn(arcp_registry::run_cleanup_loop(registry));

    // ── Periodic session pruning ─────────────────────────────────────
    {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                sessions.prune_expired();
            }
        });
    }

    // ── Periodic rate-limit record sweep ─────────────────────────────
    {
        let limiters = limiters.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                match limiters.cleanup().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(removed, "rate-limit records pruned"),
                    Err(e) => tracing::warn!(error = %e, "rate-limit sweep failed"),
                }
            }
        });
    }

    // ── CORS layer (config-aware) ────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors_origins);

    // ── Concurrency limit (backpressure protection) ──────────────────
    let max_concurrent = config.server.max_concurrent_requests;
    tracing::info!(max_concurrent, "concurrency limit set");

    // ── Rate-limit layer (per-IP token bucket via governor) ──────────
    let governor_layer = config.server.rate_limit_enabled.then(|| {
        use tower_governor::governor::GovernorConfigBuilder;
        use tower_governor::GovernorLayer;

        let gov_config = GovernorConfigBuilder::default()
            .per_second(config.server.rate_limit_rps)
            .burst_size(config.server.rate_limit_burst)
            .finish()
            .expect("rate limit: RATE_LIMIT_RPS and RATE_LIMIT_BURST must be > 0");

        tracing::info!(
            requests_per_second = config.server.rate_limit_rps,
            burst_size = config.server.rate_limit_burst,
            "per-IP rate limiting enabled"
        );

        GovernorLayer {
            config: Arc::new(gov_config),
        }
    });
    if governor_layer.is_none() {
        tracing::info!("per-IP rate limiting disabled (RATE_LIMIT_ENABLED=false)");
    }

    // ── Router ───────────────────────────────────────────────────────
    let router = api::router()
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent));
    let app = if let Some(gov) = governor_layer {
        router.layer(gov).with_state(state)
    } else {
        router.with_state(state)
    };

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "ARCP listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("axum server error")?;

    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins. A literal
/// `"*"` allows all origins (not recommended for production).
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    use axum::http::header;

    if origins.len() == 1 && origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let exact: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(exact))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
