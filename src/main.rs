//! healthz: health-check and build identity service.
//!
//! This is the application entry point. It loads configuration from a TOML
//! file, initializes tracing, builds the probe registry (default probes plus
//! the URL probes extension), sets up the Axum router and serves until a
//! shutdown signal arrives.

use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use healthz::config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use healthz::health::{Catalog, Extension, Registry};
use healthz::ping::PingJson;
use healthz::routes::create_router;
use healthz::shutdown::shutdown_signal;
use healthz::state::AppState;
use healthz::SetupError;

/// healthz: JSON health report and build identity endpoints
#[derive(Parser, Debug)]
#[command(name = "healthz", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "healthz=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

fn init_tracing(filter: &str, logging: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(filter));
    if logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), SetupError> {
    let args = Args::parse();

    // Config first: it decides the log format
    let config = AppConfig::load(&args.config)?;

    // Priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    init_tracing(&log_filter, &config.logging);

    tracing::info!(path = %args.config, "Loaded configuration");

    // URL probes are validated now, registered on every (re)load
    let url_probes = config.url_probes()?;
    for probe in &url_probes {
        tracing::info!(name = %probe.name(), "URL probe configured");
    }
    if config.url_probes_ignored() {
        tracing::warn!(
            count = url_probes.len(),
            "URL probes configured but health.autodiscover is off, they will not run"
        );
    }

    let registry = Registry::from_config(&config.health, Catalog::builtin(&config.database))?
        .with_extension(Extension::new("url_probes", move |registry| {
            for probe in &url_probes {
                registry.register_shared(probe.clone());
            }
        }));
    tracing::info!(
        database = %config.database.address,
        autodiscover = config.health.autodiscover,
        concurrent = config.health.concurrent,
        "Initialized probe registry"
    );

    let ping = config.ping.as_ref().map(PingJson::new).transpose()?;
    if ping.is_none() {
        tracing::info!("No [ping] section, build identity endpoint disabled");
    }

    let app = create_router(AppState::new(registry, ping));

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port)
        .parse()
        .map_err(|e| SetupError::Address(format!("{}:{}: {}", config.http.host, config.http.port, e)))?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
