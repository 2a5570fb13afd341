//! Armory registry server binary.

use anyhow::{Context, Result};
use armory_core::AppConfig;
use armory_server::proto::registry_service_server::RegistryServiceServer;
use armory_server::{AppState, RegistryApi};
use clap::Parser;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Armory - a content-addressed artifact registry
#[derive(Parser, Debug)]
#[command(name = "armoryd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "ARMORY_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    if config.human_readable_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration (file is optional, env vars can provide/override
    // everything; every key has a default).
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        figment = figment.merge(Toml::file(&args.config));
    }
    let config: AppConfig = figment
        .merge(Env::prefixed("ARMORY_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    init_tracing(&config);

    tracing::info!("Armory v{}", env!("CARGO_PKG_VERSION"));
    if !config_path.exists() {
        tracing::debug!("no config file found at {}, using defaults and env", args.config);
    }

    // Initialize the blob backend and verify connectivity before accepting
    // requests, so misconfiguration surfaces at startup.
    let storage = armory_storage::from_config(&config)
        .await
        .context("failed to initialize storage backend")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "storage backend initialized");

    // Initialize the metadata store (runs migrations).
    let metadata = armory_metadata::from_config(&config.database)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("metadata store initialized");

    let state = AppState::new(Some(storage), metadata);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port)
        .parse()
        .context("invalid listen address")?;

    tracing::info!("listening on {}", addr);

    tonic::transport::Server::builder()
        .add_service(RegistryServiceServer::new(RegistryApi::new(state)))
        .serve(addr)
        .await
        .context("server terminated")?;

    Ok(())
}
