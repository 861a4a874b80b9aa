// dmh-api/src/lib.rs
// ============================================================================
// Module: DMH API Library
// Description: HTTP surface, configuration, metrics, and server assembly.
// Purpose: Expose issuer and keeper over HTTP per enabled component.
// Dependencies: dmh-core, dmh-executors, dmh-store-file, dmh-vault, axum
// ============================================================================

//! ## Overview
//! This crate assembles the runnable system: it loads and validates the
//! configuration, builds the issuer engine and the keeper store per enabled
//! component, mounts the HTTP routes, runs the dispatcher and metrics
//! collector tasks, and serves until shutdown. Handlers bridge into the
//! synchronous core with `spawn_blocking`. Security posture: request bodies
//! are untrusted and validated fail-closed; responses and logs never carry
//! key material or plaintext payloads.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod vault_client;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::Component;
pub use config::Config;
pub use config::ConfigError;
pub use error::ApiError;
pub use metrics::Metrics;
pub use routes::ApiState;
pub use routes::IssuerEngine;
pub use routes::IssuerParts;
pub use routes::build_router;
pub use server::ServeError;
pub use vault_client::HttpKeyVault;
