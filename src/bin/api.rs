use forward_relay_bot::{
    api::start_server,
    commentary::CommentaryService,
    config::Settings,
    sweeper::spawn_sweeper,
};
use std::fs::OpenOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load settings (creds.txt / .env / environment)
    let settings = Settings::from_env()?;

    // Initialize tracing: console plus an optional plain-text log file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));

    let mut log_file_error = None;
    let file_layer = settings.log_file.as_deref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file))),
            Err(e) => {
                log_file_error = Some(format!("{}: {}", path, e));
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    if let Some(err) = log_file_error {
        warn!("Cannot open log file {}, logging to console only", err);
    }

    info!("🚀 Forward Relay Bot - API Server");
    info!("📍 Port: {}", settings.port);

    let service = Arc::new(CommentaryService::from_settings(&settings)?);
    info!("✅ Commentary service initialized");

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        service.clone(),
        Duration::from_secs(settings.sweep_interval_secs),
        shutdown.clone(),
    )?;

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                signal_token.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    info!("📡 Starting API server...");
    start_server(service, settings.port, shutdown.clone()).await?;

    shutdown.cancel();
    sweeper.await?;

    Ok(())
}
