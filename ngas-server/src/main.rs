//! # NGAS Server
//!
//! HTTP front-end for the archive ingestion core: accepts `QARCHIVE`,
//! `BBCPARC`, and multipart container archive requests, drives them through
//! the Archive Coordinator, and replies with the NGAMS status XML.
//!
//! ## Architecture
//!
//! - PostgreSQL holds the volume and file catalog (`ngas-core::volume`,
//!   `ngas-core::catalog`)
//! - Axum serves the command set at the router root
//! - Configuration layers a TOML file under `NGAS_*` environment overrides
//!   under CLI flags

pub mod config;
pub mod db;
pub mod handlers;
pub mod infra;
pub mod routes;
pub mod xml;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ngas_core::cache::{InMemoryCacheNotifier, NoopCacheNotifier};
use ngas_core::catalog::CatalogGateway;
use ngas_core::coordinator::{ArchiveCoordinator, VolumePolicy};
use ngas_core::dapi::{DapiGateway, GenericDapi};
use ngas_core::mime::MimeTable;
use ngas_core::staging::StagingConfig;
use ngas_core::subscription::SubscriptionTrigger;
use ngas_core::volume::{SlotLocks, VolumeRegistry};
use ngas_core::ServerContext;

use crate::config::{Config, ConfigOverrides};
use crate::infra::app_state::AppState;

/// Command-line overrides for the NGAS server; anything left unset falls
/// back to the config file, then `NGAS_*` environment variables, then
/// built-in defaults (see [`Config::load`]).
#[derive(Parser, Debug)]
#[command(name = "ngas-server")]
#[command(about = "Archive ingestion front-end: QARCHIVE, BBCPARC, container archive")]
struct Args {
    /// Path to the TOML configuration file (default: ./ngas.toml, then /etc/ngas/ngas.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server port (overrides config and NGAS_SERVER_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server bind address (overrides config and NGAS_SERVER_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Database URL (overrides config and NGAS_DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ngas_server=debug,ngas_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(
        args.config.as_deref(),
        ConfigOverrides {
            host: args.host,
            port: args.port,
            database_url: args.database_url,
        },
    )?;
    info!(host = %config.server.host, port = config.server.port, "configuration loaded");

    let pool = db::connect(&config.database).await?;
    db::run_migrations(&pool).await?;
    info!("database migrations applied");

    let volumes = Arc::new(VolumeRegistry::new(pool.clone(), config.host_id.clone()));
    let slot_locks = Arc::new(SlotLocks::new());
    let mime_table = Arc::new(MimeTable::new(config.mime_table.clone()));
    let dapi = Arc::new(DapiGateway::new(Arc::new(GenericDapi)));
    let catalog: Arc<dyn ngas_core::catalog::CatalogSink> = Arc::new(CatalogGateway::new(pool.clone()));
    let (subscriptions, mut subscription_rx) = SubscriptionTrigger::new();
    tokio::spawn(async move {
        while let Some(event) = subscription_rx.recv().await {
            info!(file_id = %event.file_id, file_version = event.file_version, "subscription notified");
        }
    });

    let cache: Arc<dyn ngas_core::cache::CacheNotifier> = if config.caching_active {
        Arc::new(InMemoryCacheNotifier::new())
    } else {
        Arc::new(NoopCacheNotifier)
    };

    let context = Arc::new(ServerContext::new(
        config.host_id.clone(),
        config.archiving_allowed,
    ));

    let staging_cfg = StagingConfig {
        block_size: config.staging.block_size,
        recv_buf_size: config.staging.recv_buf_size,
        idle_timeout: std::time::Duration::from_secs(config.staging.idle_timeout_secs),
    };

    let coordinator = Arc::new(ArchiveCoordinator {
        context: context.clone(),
        volumes,
        slot_locks,
        mime_table,
        dapi,
        catalog,
        subscriptions,
        cache,
        caching_active: config.caching_active,
        staging_cfg,
        volume_policy: VolumePolicy {
            free_space_disk_change_mb: config.volume.free_space_disk_change_mb,
        },
    });

    let config = Arc::new(config);
    let state = AppState {
        coordinator,
        context,
        config: config.clone(),
    };

    let router = routes::create_api_router(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "ngas-server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    info!("shutdown signal received");
}
