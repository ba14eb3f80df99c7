//! TaskFast server binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Open the SQLite task store (optionally seeding it)
//! 3. Start the session expiry sweeper
//! 4. Start the axum REST API server

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use taskfast_api::{start_server, AppState};
use taskfast_core::config::TaskfastConfig;
use taskfast_storage::{seed_if_empty, Database};

use crate::cli::CliArgs;

/// Periodically drop expired conversations.
async fn session_sweeper(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        let purged = state.sweep_expired();
        if purged > 0 {
            tracing::debug!(purged, "Expired conversations swept");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliArgs::parse();
    let config_file = cli.resolve_config_path();
    let loaded = TaskfastConfig::load(&config_file);

    // Tracing. RUST_LOG wins over the resolved level.
    let level = cli.resolve_log_level(loaded.as_ref().ok().map(|c| c.general.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)))
        .init();

    tracing::info!("Starting TaskFast v{}", env!("CARGO_PKG_VERSION"));

    // Config.
    let mut config = match loaded {
        Ok(config) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            tracing::warn!(path = %config_file.display(), error = %e, "Using default configuration");
            TaskfastConfig::default()
        }
    };
    if let Some(dir) = cli.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    config.server.port = cli.resolve_port(config.server.port);

    // Storage.
    let db_path = config.database_path();
    if let Some(dir) = db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::error!(path = %dir.display(), error = %e, "Failed to create data directory");
            return Err(e.into());
        }
    }
    let database = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let sweep_secs = config.agent.sweep_interval_secs;
    let state = AppState::new(config, database);

    if cli.seed {
        let inserted = seed_if_empty(&state.repo)?;
        tracing::info!(inserted, "Seeding complete");
    }

    // === Background tasks ===
    if sweep_secs > 0 && state.config.agent.session_ttl_minutes > 0 {
        tokio::spawn(session_sweeper(state.clone(), sweep_secs));
    }

    // === API server ===
    start_server(state).await?;

    Ok(())
}
