//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (`x-request-id`)
//! 4. Security headers (CSP, frame and isolation policies)
//! 5. Rate limiting on sign-in, sign-up and uploads (governor)
//!
//! Identity is resolved lazily by the extractors in [`auth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{
    AdminRejection, CurrentSession, RequestMeta, RequireAdmin, RequireAuth, SESSION_COOKIE,
    removal_cookie, session_cookie, session_token,
};
pub use rate_limit::{auth_rate_limiter, upload_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
