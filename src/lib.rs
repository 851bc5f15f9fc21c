pub mod auth;
pub mod db;
pub mod error;
pub mod jobs;
mod migrations;
mod pdf;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod types;
pub mod util;

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

use state::AppState;

/// Channel buffer size for scheduler messages
const SCHEDULER_CHANNEL_SIZE: usize = 32;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Db(#[from] db::DbError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Start the server: logging, config, store, background jobs, HTTP.
pub async fn run() -> Result<(), StartupError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = state::load_config().map_err(StartupError::Config)?;
    let state = Arc::new(AppState::new(config)?);

    // Scheduler -> job runner
    let (scheduler_tx, scheduler_rx) = mpsc::channel(SCHEDULER_CHANNEL_SIZE);

    let scheduler_state = state.clone();
    tokio::spawn(async move {
        let scheduler = scheduler::Scheduler::new(scheduler_state, scheduler_tx);
        scheduler.run().await;
    });

    let runner_state = state.clone();
    tokio::spawn(async move {
        jobs::run_job_loop(runner_state, scheduler_rx).await;
    });

    let address = format!("0.0.0.0:{}", state.config.port);
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    log::info!("Pulse listening on {}", address);

    axum::serve(listener, routes::build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)?;

    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
