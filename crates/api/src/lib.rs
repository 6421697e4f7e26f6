//! Profilehub HTTP API.
//!
//! Exposes the coordination services (locks, presence, session sync,
//! fingerprint policies, team health) as JSON endpoints under `/api/v1`,
//! plus a WebSocket channel that fans platform events out to the users
//! and teams they concern.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod notifications;
pub mod response;
pub mod routes;
pub mod state;
pub mod ws;
