//! HTTP surface of the error-log RAG service.

use std::sync::Arc;

mod core;
mod error_handler;
mod middleware_layer;
mod routes;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use crate::core::app_state::AppState;
pub use crate::error_handler::AppError;

use crate::middleware_layer::request_id::request_id;
use crate::routes::{echo_route::echo, health_route::health, submit_query::submit_query_route::submit_query};

const DEFAULT_PORT: &str = "5000";

/// All routes with request-id and trace layers.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/echo", get(echo))
        .route("/submit_query", post(submit_query))
        .layer(middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `API_ADDRESS`, or `0.0.0.0:${PORT:-5000}`.
pub fn bind_address_from(get: &dyn Fn(&str) -> Option<String>) -> String {
    let non_blank = |k: &str| get(k).filter(|v| !v.trim().is_empty());
    non_blank("API_ADDRESS").unwrap_or_else(|| {
        let port = non_blank("PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());
        format!("0.0.0.0:{}", port.trim())
    })
}

/// Builds the state from the environment and serves until Ctrl+C.
pub async fn start() -> Result<(), AppError> {
    let addr = bind_address_from(&|k| std::env::var(k).ok());
    let state = Arc::new(AppState::from_env().await?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| AppError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(%addr, "RAG service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
