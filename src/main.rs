//! Main entry point for the textsync relay server.
//!
//! This binary serves the collaborative editing engine over HTTP and
//! WebSocket using the Axum web framework.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use textsync::server::create_router;
use textsync::session::SessionManager;

/// Default bind address, the same port the original relay listened on.
const DEFAULT_ADDR: &str = "127.0.0.1:4000";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting textsync relay server...");

    let manager = Arc::new(SessionManager::new());
    let app = create_router(manager);

    let addr: SocketAddr = std::env::var("TEXTSYNC_ADDR")
        .ok()
        .and_then(|raw| match raw.parse() {
            Ok(addr) => Some(addr),
            Err(e) => {
                warn!(error = %e, raw, "invalid TEXTSYNC_ADDR, using default");
                None
            }
        })
        .unwrap_or_else(|| DEFAULT_ADDR.parse().unwrap());

    info!("Server listening on http://{}", addr);
    info!("Available endpoints:");
    info!("  GET /health                      - Health check");
    info!("  GET /documents/:id/stats         - Session statistics");
    info!("  GET /documents/:id/ws            - Collaborative editing WebSocket");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
