//! HTTP server lifecycle
//!
//! Binds the configured address and serves the API router until the
//! shutdown future resolves.

use crate::api::{create_router, AppContext};
use crate::error::{Error, Result};
use std::future::Future;
use std::net::SocketAddr;
use tracing::info;

/// Run the HTTP API server
pub async fn run<F>(addr: SocketAddr, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
