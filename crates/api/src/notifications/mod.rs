//! Delivery of platform events to connected users.

pub mod router;

pub use router::NotificationRouter;
