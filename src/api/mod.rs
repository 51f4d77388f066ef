//! Dashboard REST API
//!
//! HTTP layer for the telemetry dashboard, built with Axum.
//!
//! # Endpoints
//!
//! - `GET /api/measurements?range={1h|6h|12h|24h|today|week|month|year}` -
//!   bucketed series (absent/unknown range = all-time)
//! - `GET /api/measurements/latest` - `{"latest": row, "trajectory": n|null}`
//!
//! Static frontend files are served by whatever fronts this process; this
//! layer is JSON only. CORS is left permissive for the local dashboard.

pub mod error;
pub mod routes;

pub use error::{ApiError, ApiResult};

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::storage::QueryEngine;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Read-side engine over the store
    pub engine: QueryEngine,
}

impl AppState {
    pub fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }
}

/// Build the API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/measurements", get(routes::get_measurements))
        .route("/measurements/latest", get(routes::get_latest));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Serve the API until the cancellation signal fires, then drain in-flight
/// requests and return.
pub async fn serve(state: AppState, addr: &str, cancel: CancellationToken) -> Result<(), ApiError> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("dashboard API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    tracing::info!("dashboard API shut down gracefully");
    Ok(())
}
