//! Request extractors and middleware.
//!
//! - [`auth::AuthUser`] -- Extracts the caller's user and team from a JWT.
//! - [`latency::track_latency`] -- Feeds request durations into the health
//!   latency gauge.

pub mod auth;
pub mod latency;
