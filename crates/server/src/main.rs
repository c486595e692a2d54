mod api;
mod cli;
mod error;
mod middleware;
mod state;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use sha2::{Digest, Sha256};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, ConfigCommand};
use clap::Parser;
use konsul_acl::{AclEvaluator, PolicyStore};
use konsul_audit::{AuditPipeline, Backpressure, Sink};
use konsul_auth::{ApiKeyService, JwtService};
use konsul_catalog::ServiceCatalog;
use konsul_domain::config::{Config, ConfigSeverity, CorsConfig, EngineKind};
use konsul_dns::DnsServer;
use konsul_kv::KvStore;
use konsul_ratelimit::RateLimiter;
use konsul_storage::{Engine, MemoryEngine, RedbEngine};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            let (config, _config_path) = cli::load_config()?;
            init_tracing(&config.logging);
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = cli::load_config()?;
            let passed = cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = cli::load_config()?;
            let valid = cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config);
            Ok(())
        }
    }
}

fn init_tracing(logging: &konsul_domain::config::LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},konsul_server=debug", logging.filter)));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("konsul starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── Storage engine ───────────────────────────────────────────────
    let engine: Arc<dyn Engine> = match config.storage.engine {
        EngineKind::Memory => {
            tracing::info!("storage engine: in-memory (data does not survive a restart)");
            Arc::new(MemoryEngine::new())
        }
        EngineKind::Redb => {
            let path = std::path::Path::new(&config.storage.data_dir).join("konsul.redb");
            let engine = RedbEngine::open(&path)
                .map_err(|e| anyhow::anyhow!("opening storage at {}: {e}", path.display()))?;
            tracing::info!(path = %path.display(), "storage engine: redb");
            Arc::new(engine)
        }
    };

    // ── Stores built on the engine ────────────────────────────────────
    let kv = Arc::new(KvStore::new(engine.clone()));
    let catalog = Arc::new(ServiceCatalog::new(engine.clone(), config.catalog.default_ttl_secs));
    let policies = Arc::new(PolicyStore::new(engine.clone()));
    tracing::info!("kv store, service catalog, and policy store ready");

    // ── ACL ───────────────────────────────────────────────────────────
    let acl = Arc::new(AclEvaluator::new(config.acl.default_policy == "allow"));
    tracing::info!(enabled = config.acl.enabled, default_policy = %config.acl.default_policy, "acl evaluator ready");

    // ── JWT signing secret ─────────────────────────────────────────────
    let jwt_secret = match std::env::var(&config.auth.jwt.secret_env) {
        Ok(s) if !s.is_empty() => s.into_bytes(),
        _ => {
            tracing::warn!(
                env_var = %config.auth.jwt.secret_env,
                "JWT secret unset — generating an ephemeral one; existing tokens will not survive this restart"
            );
            random_secret()
        }
    };
    let jwt = Arc::new(JwtService::new(
        &jwt_secret,
        config.auth.jwt.issuer.clone(),
        config.auth.jwt.access_ttl_secs,
        config.auth.jwt.refresh_ttl_secs,
    ));
    let api_keys = Arc::new(ApiKeyService::new(engine.clone(), config.auth.api_key.key_prefix.clone()));
    tracing::info!("jwt service and api key service ready");

    // ── Rate limiter ───────────────────────────────────────────────────
    let rate_limiter = Arc::new(
        RateLimiter::new(config.rate_limit.requests_per_second, config.rate_limit.burst_size)
            .with_lists(config.rate_limit.whitelist.clone(), config.rate_limit.blacklist.clone()),
    );
    tracing::info!(enabled = config.rate_limit.enabled, "rate limiter ready");

    // ── Audit pipeline ───────────────────────────────────────────────
    let sink = match config.audit.sink {
        konsul_domain::config::AuditSink::File => Sink::file(&config.audit.file_path),
        konsul_domain::config::AuditSink::Stdout => Sink::stdout(),
    };
    let backpressure = match config.audit.backpressure {
        konsul_domain::config::AuditBackpressure::Drop => Backpressure::Drop,
        konsul_domain::config::AuditBackpressure::Block => Backpressure::Block,
    };
    let audit = Arc::new(AuditPipeline::start(sink, config.audit.buffer_size, backpressure, config.audit.flush_interval_secs));
    tracing::info!(enabled = config.audit.enabled, "audit pipeline ready");

    // ── DNS ──────────────────────────────────────────────────────────
    let dns = if config.dns.enabled {
        let server = Arc::new(DnsServer::new(catalog.clone(), config.dns.domain.clone(), config.dns.record_ttl_secs));
        let bind: std::net::SocketAddr = format!("{}:{}", config.dns.bind, config.dns.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid dns bind address: {e}"))?;
        server
            .start(bind)
            .await
            .map_err(|e| anyhow::anyhow!("starting dns server on {bind}: {e}"))?;
        tracing::info!(%bind, domain = %config.dns.domain, "dns server listening");
        Some(server)
    } else {
        tracing::info!("dns server disabled");
        None
    };

    // ── Admin bootstrap token ──────────────────────────────────────────
    let admin_token_hash = match std::env::var(&config.server.admin.token_env) {
        Ok(token) if !token.is_empty() => {
            tracing::info!("admin bearer-token auth enabled");
            Some(Sha256::digest(token.as_bytes()).to_vec())
        }
        _ => {
            tracing::warn!(
                env_var = %config.server.admin.token_env,
                "admin bearer-token auth DISABLED — set {} to enable", config.server.admin.token_env
            );
            None
        }
    };

    let state = AppState {
        config: config.clone(),
        engine: engine.clone(),
        kv: kv.clone(),
        catalog: catalog.clone(),
        jwt,
        api_keys,
        policies,
        acl,
        rate_limiter: rate_limiter.clone(),
        audit: audit.clone(),
        dns,
        admin_token_hash,
    };

    // ── Service expiry sweep ───────────────────────────────────────────
    {
        let catalog = catalog.clone();
        let interval_secs = config.catalog.sweep_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                match catalog.cleanup_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(expired = n, "swept expired services"),
                    Err(e) => tracing::warn!(error = %e, "service expiry sweep failed"),
                }
            }
        });
    }

    // ── Rate-limit idle bucket sweep ──────────────────────────────────
    if config.rate_limit.enabled {
        let rate_limiter = rate_limiter.clone();
        let idle_secs = config.rate_limit.idle_sweep_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(idle_secs));
            loop {
                interval.tick().await;
                let swept = rate_limiter.sweep_idle(idle_secs as i64);
                if swept > 0 {
                    tracing::debug!(swept, "rate limiter idle buckets swept");
                }
            }
        });
    }

    // ── Storage maintenance tick ────────────────────────────────────────
    {
        let engine = engine.clone();
        let interval_secs = config.storage.gc_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                if let Err(e) = engine.maintain().await {
                    tracing::warn!(error = %e, "storage maintenance tick failed");
                }
            }
        });
    }

    let cors_layer = build_cors_layer(&config.server.cors);
    let app = api::router(state).layer(cors_layer);

    let addr = format!("{}:{}", config.server.bind, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("binding to {addr}: {e}"))?;
    tracing::info!(%addr, "konsul listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    audit.close(std::time::Duration::from_secs(5)).await;
    Ok(())
}

fn random_secret() -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler");
        sig.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

/// Build a [`CorsLayer`] from the configured allowed origins. Origins may
/// carry a trailing `:*` wildcard port (e.g. `http://localhost:*`); a bare
/// `"*"` allows everything (not recommended for production).
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
