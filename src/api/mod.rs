//! widiff HTTP API
//!
//! HTTP layer built with Axum.
//!
//! # Endpoints
//!
//! - `GET /diff` - Latest report as JSON
//! - `GET /notify` - Server-sent events, one `report` event per refresh
//! - `GET /health` - Service status
//! - `GET /view/*` - Static web client
//!
//! # Example
//!
//! ```rust,ignore
//! use widiff::api::{serve, ApiConfig, AppState};
//! use widiff::broker::{Broker, BrokerConfig};
//! use std::sync::Arc;
//!
//! let broker = Arc::new(Broker::new(BrokerConfig::default()));
//! broker.start().await?;
//!
//! let config = ApiConfig::default();
//! let state = AppState::new(broker, pipeline.pull(), config.clone());
//! serve(state, &config).await?;
//! ```

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use crate::broker::BrokerError;

use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .route("/diff", get(routes::diff::latest_diff))
        .route("/notify", get(routes::notify::notify))
        .route("/health", get(routes::health::health))
        .nest_service("/view", static_files)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server; returns once a shutdown signal was handled.
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(addr = %addr, "widiff API listening");

    serve_until(listener, state, shutdown_signal()).await
}

/// Serve on `listener` until `signal` resolves.
///
/// The broker is stopped as soon as the signal fires so that open `/notify`
/// streams end and the graceful drain can complete.
pub async fn serve_until<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    signal: F,
) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let broker = Arc::clone(&state.broker);
    let router = build_router(state);

    let shutdown = async move {
        signal.await;
        match broker.stop().await {
            Ok(()) | Err(BrokerError::AlreadyStopped) => {}
            Err(e) => tracing::warn!(error = %e, "Broker stop failed during shutdown"),
        }
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("widiff API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
