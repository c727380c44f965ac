//! HTTP server
//!
//! A thin axum adapter over [`PredictionService`]: handlers parse requests,
//! call the service and map [`EnsembleError`](crate::error::EnsembleError)s
//! onto status codes.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use crate::config::EngineConfig;
use crate::inference::PredictionService;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Build the service from `config` and serve until ctrl+c
pub async fn run_server(config: EngineConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    std::fs::create_dir_all(&config.models_dir)?;
    info!(
        models_dir = %config.models_dir.display(),
        started_at = %start_time.to_rfc3339(),
        "Initializing prediction service"
    );

    let service = Arc::new(PredictionService::open(config.clone())?);
    let app = create_router(Arc::new(AppState::new(service)));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening");
    info!(url = %format!("http://{}/api/health", addr), "Health endpoint available");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
