//! HTTP surface: `POST /api/rag` and `GET /health`.
pub mod handlers;
pub mod router;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::state::AppState;
pub use router::router;

/// Serve until the state's shutdown token is cancelled.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Listening on {}", addr);

    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}
