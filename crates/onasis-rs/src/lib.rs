//! # Onasis-rs API Aggregation Gateway
//!
//! The execution substrate of the Onasis gateway: a heterogeneous set of
//! upstream services (payments, banking, identity verification, AI,
//! memory, infrastructure) exposed through two uniform transports — a
//! REST facade and a JSON-RPC tool-call protocol. Callers bind to
//! capability categories, never to vendors; swapping a vendor is a
//! configuration change.
//!
//! ## Core Pieces
//!
//! - **Adapter Registry** — a catalog-driven set of vendor adapters (real
//!   and mock) addressed as `adapterId:toolName`.
//! - **Vendor Abstraction Layer** — category/operation calls with schema
//!   validation and per-vendor input transforms.
//! - **Resilient HTTP Client** — one per adapter: auth injection, retry
//!   with exponential backoff, circuit breaking, rate-limit accounting.
//! - **Discovery Layer** — five meta-tools that keep the lazy-mode tool
//!   catalog bounded.
//! - **Gateway Policy** — request identity, CORS, scoped rate limits, and
//!   central proxying to the edge-function fleet.
//!
//! ## Request Flow
//!
//! ```text
//! Client ──▶ middleware (identity, CORS, rate limit)
//!        ──▶ /api/{category}/{operation} ──▶ Abstraction Layer ─┐
//!        ──▶ POST /mcp (tools/call)      ──▶ Adapter Registry ──┤
//!                                                               ▼
//!                                         Adapter ──▶ HttpClient ──▶ upstream
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use onasis_rs::config::catalog::load_catalog;
//! use onasis_rs::config::settings::load_settings;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = load_settings()?;
//! let catalog = load_catalog(&settings.catalog_path, &settings.services_dir)?;
//! println!("{} adapters configured", catalog.adapters.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Environment settings and the adapter catalog
//! - [`models`] - Error taxonomy, tools, request context, wire envelopes
//! - [`services`] - Clients, adapters, registry, VAL, discovery
//! - [`routes`] - HTTP handlers for every inbound surface
//! - [`middleware`] - Identity, CORS, rate limiting, security headers
//! - [`logs`] - Logger configuration
//! - [`utils`] - URL and hashing helpers

pub mod config;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;
