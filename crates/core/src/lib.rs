//! Domain types and pure rules for profile coordination.
//!
//! This crate performs no I/O. Storage is reached only through the traits in
//! [`store`]; the services that drive those traits live in
//! `profilehub-coordinator`.

pub mod clock;
pub mod error;
pub mod fingerprint;
pub mod health;
pub mod locking;
pub mod memory;
pub mod presence;
pub mod session;
pub mod store;
pub mod types;
