//! HTTP route handlers for the onasis-rs gateway.
//!
//! The surface splits into: operational endpoints (manifest, health,
//! metrics, route policy), the abstracted REST facade under `/api`, the
//! JSON-RPC tool protocol on `/mcp`, and the central proxy routes onto
//! the edge-function fleet.
//!
//! # Module Organization
//!
//! - [`manifest`] - `GET /`, route policy, API-service catalog + proxy
//! - [`health`] - Health, readiness, and liveness probes
//! - [`api`] - Abstracted REST facade (`POST /api/{category}/{operation}`)
//! - [`rpc`] - JSON-RPC 2.0 on `POST /mcp`, SSE on `GET /mcp`
//! - [`proxy`] - Edge-function proxy and the AI chat fallback route
//! - [`metrics`] - Counters, histograms, Prometheus exposition

pub mod api;
pub mod health;
pub mod manifest;
pub mod metrics;
pub mod proxy;
pub mod rpc;
