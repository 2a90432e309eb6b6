//! jobcast server
//!
//! Loads configuration, prepares the content store, wires the job registry
//! to the session hub and cluster relay, then serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use jobcast_jobs::{BroadcastEmitter, DetachedChannel, JobRegistry, SessionHub};
use jobcast_server::housekeeping::spawn_retention_sweep;
use jobcast_server::state::AppState;
use jobcast_store::SqlContentStore;
use tokio::net::TcpListener;

mod cli;
mod config_helpers;
mod config_reloader;
mod tracing_setup;

use cli::CliArgs;
use config_helpers::{database_config_from_config, parse_bind_address};
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config = jobcast_config::load_config(args.config_path.as_deref())
        .context("failed to load configuration")?;
    jobcast_config::validate_config(&config).context("invalid configuration")?;

    let reload_handle = install_tracing_from_config(&config.logging);
    tracing::info!(config_path = ?args.config_path, "configuration loaded");

    if let Some(path) = args.config_path.clone() {
        config_reloader::spawn_config_reloader(path, config.logging.level.clone(), reload_handle);
    }

    let db_cfg = database_config_from_config(&config);
    let store = SqlContentStore::connect(&db_cfg)
        .await
        .context("failed to open content store")?;
    tracing::info!(
        db_max_connections = db_cfg.max_connections,
        "content store ready"
    );

    // Single-process deployment: updates reach this worker's observers only.
    // A coordinator transport plugs in as another `ClusterChannel`.
    let hub = SessionHub::new();
    let emitter = BroadcastEmitter::new(Arc::new(hub.clone()), Arc::new(DetachedChannel))
        .with_capabilities(config.jobs.delivery_capabilities.clone());

    let registry = JobRegistry::new(Arc::new(store), emitter);
    let _sweeper = spawn_retention_sweep(
        registry.clone(),
        config.jobs.retention_days,
        Duration::from_secs(config.jobs.sweep_interval_minutes.saturating_mul(60)),
    );

    let state = Arc::new(AppState::new(registry, hub, config.jobs.clone()));
    let app = jobcast_server::build_router(state);

    let addr = parse_bind_address(&config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        worker_id = %config.cluster.worker_id,
        "server listening"
    );

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
