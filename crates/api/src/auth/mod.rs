//! Identity context.
//!
//! - [`jwt`] -- HS256 bearer token validation. Tokens are issued elsewhere.

pub mod jwt;
