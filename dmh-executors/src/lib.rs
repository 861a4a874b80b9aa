// dmh-executors/src/lib.rs
// ============================================================================
// Module: DMH Executors Library
// Description: Built-in executors and the kind-keyed registry.
// Purpose: Deliver released actions through pluggable transports.
// Dependencies: dmh-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! Executors implement the core [`dmh_core::Executor`] capability and
//! register by `kind` string. The registry itself implements the same
//! capability, so the dispatcher and the test endpoint route through one
//! surface without knowing the concrete variant. Payloads arrive as
//! untrusted JSON and are validated before anything is delivered.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod dummy;
pub mod json_post;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dummy::DummyExecutor;
pub use json_post::JsonPostConfig;
pub use json_post::JsonPostExecutor;
pub use registry::ExecutorRegistry;
