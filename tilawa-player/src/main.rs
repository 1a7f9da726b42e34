//! Tilawa Player - Main entry point
//!
//! Verse playback service: resolves surahs and saved sections into verse
//! playlists, plays them with per-verse repetition, delays and source
//! fallback, and exposes control over HTTP with an SSE event stream.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tilawa_common::events::EventBus;
use tilawa_player::api::{self, AppContext};
use tilawa_player::config::{Config, ConfigOverrides};
use tilawa_player::content::AlQuranCloudClient;
use tilawa_player::db;
use tilawa_player::playback::player::StreamingPlayerFactory;
use tilawa_player::playback::SessionController;
use tilawa_player::SharedState;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Broadcast capacity for session events
const EVENT_CAPACITY: usize = 256;

/// Command-line arguments for tilawa-player
#[derive(Parser, Debug)]
#[command(name = "tilawa-player")]
#[command(about = "Verse playback engine for recitation listening and memorization")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "TILAWA_PORT")]
    port: Option<u16>,

    /// TOML config file
    #[arg(short, long, env = "TILAWA_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file (overrides the config file)
    #[arg(short, long, env = "TILAWA_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(ConfigOverrides {
        config_path: args.config,
        database_path: args.database,
        port: args.port,
    })
    .context("Failed to load configuration")?;

    // RUST_LOG wins; otherwise the configured level applies to our crates
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "tilawa_player={0},tilawa_common={0},tower_http={0}",
                    level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Tilawa Player v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config.source {
        Some(path) => info!("Configuration: {}", path.display()),
        None => warn!("No config file found, using built-in defaults"),
    }
    info!("Database: {}", config.database_path.display());

    let db_pool = db::init_database(&config.database_path, &config.content.default_reciter)
        .await
        .context("Failed to initialize database")?;

    let state = SharedState::new(EventBus::new(EVENT_CAPACITY));

    let factory = StreamingPlayerFactory::new(&config.audio)
        .context("Failed to initialize audio backend")?;
    let controller = Arc::new(SessionController::new(
        Arc::new(factory),
        Arc::clone(&state),
        config.session.error_advance_delay(),
    ));

    let content = AlQuranCloudClient::new(&config.content)
        .context("Failed to initialize content client")?;
    info!("Content provider: {}", config.content.base_url);

    let ctx = AppContext {
        state,
        controller: Arc::clone(&controller),
        db_pool: db_pool.clone(),
        content: Arc::new(content),
        default_reciter: config.content.default_reciter.clone(),
    };

    api::run(config.port, ctx, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    if let Err(e) = controller.stop().await {
        warn!("Failed to stop session cleanly: {}", e);
    }
    db_pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
