//! REST API for Tasktrack
//!
//! Builds the axum router over a [`tasktrack_db::Database`], with bearer
//! authentication, workspace/project access guards and JSON error bodies.

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::ApiError;
pub use state::AppState;

use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tasktrack_db::DbError;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Errors that stop the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("database error: {}", .0.full_message())]
    Database(#[from] DbError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Build the application router with tracing and body-size limits.
pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;
    routes::routes()
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured listen address.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Serve requests on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)
}
