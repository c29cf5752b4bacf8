//! HTTP transport for the execute endpoint.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /api/execute` | start or continue a session |
//! | `DELETE /api/execute?sessionId=<id>` | terminate a session |
//! | `GET /health` | liveness check |

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::orchestrator::coordinator::Coordinator;
use crate::{AppError, Result};

/// Shared state handed to every handler.
pub struct AppState {
    /// Request coordinator owning the session store.
    pub coordinator: Arc<Coordinator>,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/execute",
            post(handlers::execute).delete(handlers::terminate),
        )
        .with_state(state)
}

/// Bind the HTTP listener.
///
/// # Errors
///
/// Returns `AppError::Http` if the address cannot be bound.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Http(format!("failed to bind {addr}: {err}")))
}

/// Serve the router on `listener` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Http` if the server fails.
pub async fn serve(state: Arc<AppState>, listener: TcpListener, ct: CancellationToken) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Http(format!("listener has no local address: {err}")))?;
    info!(%local, "starting HTTP transport");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Http(format!("server error: {err}")))?;

    info!("HTTP transport shut down");
    Ok(())
}
