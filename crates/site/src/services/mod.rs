//! Business logic services for the Savers site.
//!
//! # Services
//!
//! - `auth` - Sessions, password sign-in, and user administration
//! - `upload` - Image validation and object storage uploads

pub mod auth;
pub mod upload;
