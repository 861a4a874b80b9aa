// dmh-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Action Store
// Description: Simple in-memory action store for tests and examples.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! This module provides a simple in-memory implementation of
//! [`ActionStore`] for tests and local demos. It is not intended for
//! production use: nothing is persisted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use time::OffsetDateTime;

use crate::core::EncryptedAction;
use crate::core::IssuerState;
use crate::core::ProcessedState;
use crate::interfaces::ActionStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory action store for tests and examples.
#[derive(Debug, Clone)]
pub struct InMemoryActionStore {
    /// Issuer state protected by a mutex.
    state: Arc<Mutex<IssuerState>>,
}

impl InMemoryActionStore {
    /// Creates an empty store with `last_seen` set to now.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(IssuerState::new(OffsetDateTime::now_utc()))
    }

    /// Creates a store seeded with the given state.
    #[must_use]
    pub fn with_state(state: IssuerState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Overwrites the heartbeat; test seam for gate scenarios.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn set_last_seen(&self, last_seen: OffsetDateTime) -> Result<(), StoreError> {
        self.lock()?.last_seen = last_seen;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, IssuerState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Invalid("action store mutex poisoned".to_string()))
    }
}

impl Default for InMemoryActionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionStore for InMemoryActionStore {
    fn update_last_seen(&self) -> Result<(), StoreError> {
        self.lock()?.last_seen = OffsetDateTime::now_utc();
        Ok(())
    }

    fn last_seen(&self) -> Result<OffsetDateTime, StoreError> {
        Ok(self.lock()?.last_seen)
    }

    fn actions(&self) -> Result<Vec<EncryptedAction>, StoreError> {
        Ok(self.lock()?.actions.clone())
    }

    fn action(&self, uuid: &str) -> Result<Option<(usize, EncryptedAction)>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .actions
            .iter()
            .enumerate()
            .find(|(_, action)| action.uuid == uuid)
            .map(|(index, action)| (index, action.clone())))
    }

    fn append_action(&self, action: EncryptedAction) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if guard.actions.iter().any(|existing| existing.uuid == action.uuid) {
            return Err(StoreError::Invalid(format!(
                "action with uuid {} already exists",
                action.uuid
            )));
        }
        guard.actions.push(action);
        Ok(())
    }

    fn remove_action(&self, uuid: &str) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let index = guard
            .actions
            .iter()
            .position(|action| action.uuid == uuid)
            .ok_or_else(|| StoreError::NotFound {
                uuid: uuid.to_string(),
            })?;
        guard.actions.remove(index);
        Ok(())
    }

    fn action_last_run(&self, uuid: &str) -> Result<Option<OffsetDateTime>, StoreError> {
        let guard = self.lock()?;
        guard
            .actions
            .iter()
            .find(|action| action.uuid == uuid)
            .map(|action| action.last_run)
            .ok_or_else(|| StoreError::NotFound {
                uuid: uuid.to_string(),
            })
    }

    fn update_action_last_run(&self, uuid: &str) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let action = guard
            .actions
            .iter_mut()
            .find(|action| action.uuid == uuid)
            .ok_or_else(|| StoreError::NotFound {
                uuid: uuid.to_string(),
            })?;
        action.last_run = Some(OffsetDateTime::now_utc());
        Ok(())
    }

    fn set_processed(&self, uuid: &str, state: ProcessedState) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let action = guard
            .actions
            .iter_mut()
            .find(|action| action.uuid == uuid)
            .ok_or_else(|| StoreError::NotFound {
                uuid: uuid.to_string(),
            })?;
        if !action.processed.permits(state) {
            return Err(StoreError::Invalid(format!(
                "processed state cannot move from {} to {}",
                action.processed.code(),
                state.code()
            )));
        }
        action.processed = state;
        Ok(())
    }
}
