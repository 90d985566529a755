use clap::{Parser, ValueEnum};
use giftcircle_service::config::{GiftdConfig, StorageConfig};
use giftcircle_service::{build_router, ServiceState};
use std::net::SocketAddr;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StorageMode {
    Auto,
    Memory,
    Postgres,
}

#[derive(Debug, Parser)]
#[command(name = "giftd", version, about = "Gift Circle REST service")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "GIFTD_CONFIG_FILE")]
    config: Option<String>,

    /// Socket address to bind, overriding the config file
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Storage backend. `auto` picks postgres when a database url is available.
    #[arg(long, value_enum, default_value_t = StorageMode::Auto)]
    storage: StorageMode,

    /// PostgreSQL url for gift ledger persistence
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Max PostgreSQL pool connections
    #[arg(long, default_value_t = 10)]
    pg_max_connections: u32,

    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn resolve_storage(cli: &Cli, configured: StorageConfig) -> anyhow::Result<StorageConfig> {
    let storage = match cli.storage {
        StorageMode::Memory => StorageConfig::Memory,
        StorageMode::Postgres => match (&cli.database_url, configured) {
            (Some(url), _) => StorageConfig::postgres(url.clone(), cli.pg_max_connections),
            (None, postgres @ StorageConfig::Postgres { .. }) => postgres,
            (None, StorageConfig::Memory) => {
                anyhow::bail!("storage=postgres requires --database-url, DATABASE_URL or a [storage] url")
            }
        },
        StorageMode::Auto => match &cli.database_url {
            Some(url) => StorageConfig::postgres(url.clone(), cli.pg_max_connections),
            None => configured,
        },
    };
    Ok(storage)
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = GiftdConfig::load(cli.config.as_deref())?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_tracing(&level, cli.json || config.logging.json);

    config.storage = resolve_storage(&cli, config.storage.clone())?;
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }

    let state = ServiceState::bootstrap(&config).await?;

    let mut events = state.events.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(event = event.name(), "gift event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut app = build_router(state);
    if config.server.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr).await?;
    info!("giftd listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
