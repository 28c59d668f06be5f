//! Data models and domain types for the onasis-rs gateway.
//!
//! This module contains the core data structures used throughout the
//! gateway: the error taxonomy, tool and schema records, the per-request
//! context, the JSON-RPC envelope, and the configuration snapshot types.
//!
//! # Module Organization
//!
//! - [`error`] - Gateway error taxonomy with stable codes and HTTP mapping
//! - [`tool`] - Tool records and the JSON Schema subset they declare
//! - [`context`] - Per-request context built by the identity middleware
//! - [`rpc`] - JSON-RPC 2.0 envelope types and code mapping
//! - [`catalog`] - Service catalog snapshot (adapter descriptors)
//! - [`settings`] - Runtime settings assembled from the environment

pub mod catalog;
pub mod context;
pub mod error;
pub mod rpc;
pub mod settings;
pub mod tool;
