//! Route handlers for the relay server.

use axum::{
    Router,
    extract::{Path, State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::server::websocket::handle_connection;
use crate::session::SessionManager;

/// Shared application state
pub type AppState = Arc<SessionManager>;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub document: String,
    pub sites: usize,
    pub pending_ops: usize,
    pub visible_elements: usize,
    pub total_elements: usize,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Basic health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
    })
}

/// Per-document session statistics, including the causal-gap counter.
pub async fn document_stats(
    Path(document_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match state.session(&document_id).await {
        Some(session) => {
            let stats = session.stats();
            Json(StatsResponse {
                document: document_id,
                sites: stats.sites,
                pending_ops: stats.pending_ops,
                visible_elements: stats.visible_elements,
                total_elements: stats.total_elements,
            })
            .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no open session for document '{document_id}'"),
            }),
        )
            .into_response(),
    }
}

/// WebSocket upgrade for collaborative editing on one document.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(document_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state, document_id))
}

/// Creates and configures the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/documents/:document_id/stats", get(document_stats))
        .route("/documents/:document_id/ws", get(ws_handler))
        .with_state(state)
}
