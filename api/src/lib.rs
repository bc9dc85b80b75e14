//! Spanform API Server
//!
//! This crate provides the HTTP server in front of the Spanform
//! normalization pipeline. It receives decoded wire batches from upstream
//! collectors, runs them through the pipeline, forwards normalized records
//! to the configured sink, and exposes the pipeline's counters.
//!
//! # Architecture
//!
//! The server is built on Axum and Tokio, providing:
//! - `POST /v1/records` for batch ingestion
//! - `GET /metrics` for the pipeline's observability counters
//! - `GET /health` for load balancers
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
mod routes;
mod state;

pub use config::Config;
pub use state::AppState;

use anyhow::Result;
use axum::Router;
use pipeline::config::PipelineConfig;
use pipeline::metrics::PipelineMetrics;
use pipeline::sink::InMemorySink;
use pipeline::Pipeline;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Runs the Spanform API server.
///
/// Initializes the server with configuration from environment variables and
/// starts listening for incoming connections. Handles graceful shutdown on
/// SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The pipeline configuration file is invalid
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the Spanform API server with the provided configuration.
///
/// This is useful for testing or when you want to provide configuration programmatically.
///
/// # Errors
///
/// Returns an error if:
/// - The pipeline configuration file is invalid
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr();

    let pipeline_config = match &config.ruleset_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading pipeline configuration");
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };

    let pipeline = Pipeline::new(pipeline_config, PipelineMetrics::new_shared())?;
    let state = AppState::new(Arc::new(pipeline), InMemorySink::new_shared());

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Spanform API server starting"
    );

    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a
/// full server, and to let embedders supply an [`AppState`] with their own
/// sink client.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::ingest_routes(state.clone()))
        .merge(routes::metrics_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
