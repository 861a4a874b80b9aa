// dmh-executors/src/registry.rs
// ============================================================================
// Module: Executor Registry
// Description: Registry routing actions to executors by kind.
// Purpose: Resolve the executor capability without exposing variants.
// Dependencies: dmh-core
// ============================================================================

//! ## Overview
//! The executor registry resolves actions by their `kind` discriminant and
//! implements the core [`Executor`] interface itself, so callers hold one
//! capability regardless of how many plug-ins are registered. An unknown
//! kind fails validation at admission time and again at run time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use dmh_core::Action;
use dmh_core::Executor;
use dmh_core::ExecutorError;

use crate::DummyExecutor;
use crate::JsonPostConfig;
use crate::JsonPostExecutor;

// ============================================================================
// SECTION: Executor Registry
// ============================================================================

/// Executor registry keyed by action kind.
pub struct ExecutorRegistry {
    /// Executor implementations keyed by kind.
    executors: BTreeMap<String, Box<dyn Executor>>,
}

impl ExecutorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            executors: BTreeMap::new(),
        }
    }

    /// Creates a registry with the built-in executors registered.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when a built-in executor fails to
    /// initialize.
    pub fn with_builtin_executors() -> Result<Self, ExecutorError> {
        let mut registry = Self::new();
        registry.register("json_post", JsonPostExecutor::new(JsonPostConfig::default())?);
        registry.register("dummy", DummyExecutor);
        Ok(registry)
    }

    /// Registers an executor under the given kind.
    pub fn register(&mut self, kind: impl Into<String>, executor: impl Executor + 'static) {
        self.executors.insert(kind.into(), Box::new(executor));
    }

    /// Returns the registered kinds in sorted order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.executors.keys().map(String::as_str).collect()
    }

    fn resolve(&self, action: &Action) -> Result<&dyn Executor, ExecutorError> {
        self.executors
            .get(&action.kind)
            .map(Box::as_ref)
            .ok_or_else(|| ExecutorError::UnknownKind(action.kind.clone()))
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ExecutorRegistry {
    fn validate(&self, action: &Action) -> Result<(), ExecutorError> {
        self.resolve(action)?.validate(action)
    }

    fn run(&self, action: &Action) -> Result<(), ExecutorError> {
        self.resolve(action)?.run(action)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn action(kind: &str, data: &str) -> Action {
        Action {
            kind: kind.to_string(),
            process_after: 1,
            min_interval: 0,
            comment: String::new(),
            data: data.to_string(),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let registry = ExecutorRegistry::with_builtin_executors().unwrap();
        let result = registry.validate(&action("carrier_pigeon", "{}"));
        assert!(matches!(result, Err(ExecutorError::UnknownKind(_))));
    }

    #[test]
    fn builtin_kinds_are_registered() {
        let registry = ExecutorRegistry::with_builtin_executors().unwrap();
        assert_eq!(registry.kinds(), vec!["dummy", "json_post"]);
    }

    #[test]
    fn validate_routes_to_the_registered_executor() {
        let registry = ExecutorRegistry::with_builtin_executors().unwrap();
        registry.validate(&action("dummy", r#"{"message":"ping"}"#)).unwrap();
        assert!(registry.validate(&action("dummy", r#"{"message":""}"#)).is_err());
    }
}
