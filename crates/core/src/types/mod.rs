//! Core types for Savers.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod role;

pub use email::{Email, EmailError};
pub use id::*;
pub use role::{BanState, DEFAULT_BAN_REASON, Role, RoleParseError};
