//! Savers Core - Shared types library.
//!
//! Types used by every Savers component:
//! - `site` - Public catalog and admin dashboard
//! - `cli` - Migrations and operator tooling
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Database encoding is opt-in via the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, email addresses, roles and ban state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
