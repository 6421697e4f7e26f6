//! Profilehub event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the notification envelope handed to the dispatcher
//!   (lock released, policy violation, sync conflict, presence changes).
//!
//! Delivery is at-least-once from the subscriber's point of view; consumers
//! must treat repeated events idempotently.

pub mod bus;

pub use bus::{event_types, EventBus, PlatformEvent};
