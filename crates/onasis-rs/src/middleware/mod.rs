//! Request processing middleware for the onasis-rs gateway.
//!
//! The chain runs in a deterministic order: dotfile defense and request
//! identity first, then CORS, then the scoped rate limiter, with the
//! security-header set innermost. The identity layer also writes the
//! structured completion log, so it must stay outermost.
//!
//! # Module Organization
//!
//! - [`request_id`] - Dotfile probe 404, `X-Request-ID`, completion log
//! - [`cors`] - Exact/suffix/localhost origin policy
//! - [`rate_limit`] - Hashed-bucket fixed windows for `/api/*` and `/mcp`
//! - [`security`] - Security response headers

pub mod cors;
pub mod rate_limit;
pub mod request_id;
pub mod security;
