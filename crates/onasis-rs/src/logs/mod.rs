//! Logging configuration for the onasis-rs gateway.
//!
//! Request completion logs are emitted by the identity middleware; this
//! module only owns the process-wide logger setup.

pub mod logger;
