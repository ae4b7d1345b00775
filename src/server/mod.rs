//! HTTP API for kicau
//!
//! - `POST /predict`: multipart upload, returns the predicted eBird code
//! - `GET /health`: model status and class list
//! - `GET /`: service banner

mod routes;

pub use routes::{HealthResponse, PredictResponse};

use crate::{config::Config, pipeline::InferencePipeline, pipeline::WorkerPool, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<InferencePipeline>,
    pub pool: WorkerPool,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Assemble state from configuration, a pipeline and its worker pool
    pub fn new(config: &Config, pipeline: Arc<InferencePipeline>, pool: WorkerPool) -> Self {
        Self {
            pipeline,
            pool,
            max_upload_bytes: config.server.max_upload_bytes,
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/predict", post(routes::predict))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind `address` and serve until Ctrl+C
pub async fn serve(state: AppState, address: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, keep serving
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown requested, draining connections");
}
