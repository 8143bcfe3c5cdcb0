//! HTTP surface
//!
//! This module provides:
//! - Stream start/stop/status routes backed by the supervisor
//! - The WebSocket endpoint feeding the realtime hub
//! - Static serving of segment output
//! - Graceful shutdown that stops every stream

pub mod config;
pub mod listener;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ServerConfig;
pub use listener::HttpServer;
pub use routes::create_router;
pub use state::AppState;
