//! AQI Server - HTTP prediction service
//!
//! Serves the two trained AQI models to the web layer. Artifacts are read
//! from disk once and shared by every request.

use anyhow::Result;
use aqi_engine::{EngineMetrics, InMemoryHistory, LazyPredictor, StructuredLogger};
use aqi_server::{api, config};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting aqi-server");

    // Load configuration
    let config = config::ServerConfig::load()?;
    info!(
        artifact_dir = %config.artifact_dir.display(),
        api_port = config.api_port,
        preload_models = config.preload_models,
        history_limit = ?config.history_limit,
        "Server configured"
    );

    let metrics = EngineMetrics::new();
    let logger = StructuredLogger::new("aqi-server");
    logger.log_startup(SERVER_VERSION);

    let predictor = Arc::new(LazyPredictor::from_dir(config.artifact_dir.clone()));
    if config.preload_models {
        // A missing artifact set is not fatal: /readyz stays 503 and
        // predictions return 503 until `aqi train` has been run.
        let lazy = Arc::clone(&predictor);
        match tokio::task::spawn_blocking(move || lazy.get()).await? {
            Ok(p) => logger.log_model_load(p.training_id(), None),
            Err(e) => logger.log_model_load(None, Some(&e.to_string())),
        }
    }

    let history = match config.history_limit {
        Some(limit) => InMemoryHistory::with_limit(limit),
        None => InMemoryHistory::new(),
    };
    let app_state = Arc::new(api::AppState::new(
        predictor,
        Arc::new(history),
        metrics,
        config.history_page_size,
    ));

    api::serve(config.api_port, app_state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
    })
    .await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
