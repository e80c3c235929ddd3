//! Relay server for the synchronization engine.
//!
//! This module contains the Axum server that exposes sessions over HTTP and
//! WebSocket: the transport adapter in front of the engine core.

pub mod routes;
pub mod websocket;

pub use routes::{AppState, create_router};
