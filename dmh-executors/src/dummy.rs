// dmh-executors/src/dummy.rs
// ============================================================================
// Module: Dummy Executor
// Description: Logging executor with fail-injection knobs.
// Purpose: Exercise the dispatch pipeline in tests without side effects.
// Dependencies: dmh-core, serde_json
// ============================================================================

//! ## Overview
//! The `dummy` executor logs its message instead of delivering anywhere.
//! Payload flags inject validation and run failures so tests can drive the
//! dispatcher's error paths.

// ============================================================================
// SECTION: Imports
// ============================================================================

use dmh_core::Action;
use dmh_core::Executor;
use dmh_core::ExecutorError;
use serde::Deserialize;
use tracing::info;

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Executor payload carried in the action's `data` field.
#[derive(Debug, Deserialize)]
struct DummyPayload {
    /// Message to log on run.
    #[serde(default)]
    message: String,
    /// Fail the run step when set.
    #[serde(default)]
    fail_on_run: bool,
    /// Fail validation when set.
    #[serde(default)]
    fail_on_validate: bool,
}

impl DummyPayload {
    fn parse(action: &Action) -> Result<Self, ExecutorError> {
        let payload: Self = serde_json::from_str(&action.data)
            .map_err(|err| ExecutorError::InvalidPayload(err.to_string()))?;
        if payload.fail_on_validate {
            return Err(ExecutorError::InvalidPayload("fail_on_validate set".to_string()));
        }
        if payload.message.is_empty() {
            return Err(ExecutorError::InvalidPayload("message must be provided".to_string()));
        }
        Ok(payload)
    }
}

// ============================================================================
// SECTION: Executor Implementation
// ============================================================================

/// Executor that logs instead of delivering; test use only.
pub struct DummyExecutor;

impl Executor for DummyExecutor {
    fn validate(&self, action: &Action) -> Result<(), ExecutorError> {
        DummyPayload::parse(action).map(|_| ())
    }

    fn run(&self, action: &Action) -> Result<(), ExecutorError> {
        let payload = DummyPayload::parse(action)?;
        if payload.fail_on_run {
            return Err(ExecutorError::Failed("fail_on_run set".to_string()));
        }
        info!(message = %payload.message, "dummy executor run");
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
