//! WebSocket infrastructure for real-time notifications.
//!
//! Provides connection management, heartbeat pings, and the authenticated
//! HTTP upgrade handler used by Axum routes.

mod handler;
pub mod manager;

pub use handler::ws_handler;
pub use manager::{start_heartbeat, WsManager};
