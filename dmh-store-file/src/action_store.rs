// dmh-store-file/src/action_store.rs
// ============================================================================
// Module: File Action Store
// Description: Durable ActionStore backed by an atomic JSON snapshot.
// Purpose: Persist issuer state so acknowledged mutations survive crashes.
// Dependencies: dmh-core, crate::snapshot
// ============================================================================

//! ## Overview
//! The file action store keeps the issuer state in memory behind one mutex
//! and rewrites the snapshot inside the critical section of every mutator,
//! so on-disk state never lags an acknowledged mutation. A missing file on
//! open means empty state with `last_seen` set to now; a malformed file is
//! corruption the process must not start from.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use dmh_core::EncryptedAction;
use dmh_core::IssuerState;
use dmh_core::ProcessedState;
use dmh_core::interfaces::ActionStore;
use dmh_core::interfaces::StoreError;
use time::OffsetDateTime;
use tracing::info;

use crate::snapshot;
use crate::snapshot::SnapshotError;

// ============================================================================
// SECTION: File Action Store
// ============================================================================

/// Durable action store backed by a single JSON document.
#[derive(Debug, Clone)]
pub struct FileActionStore {
    /// Issuer state protected by a mutex that also covers the file replace.
    state: Arc<Mutex<IssuerState>>,
    /// Snapshot path.
    path: PathBuf,
}

impl FileActionStore {
    /// Opens the store, loading a previously saved snapshot when present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] when a present snapshot fails to
    /// parse; startup must treat this as fatal.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match snapshot::read_snapshot::<IssuerState>(&path) {
            Ok(Some(state)) => state,
            Ok(None) => {
                info!(path = %path.display(), "no issuer state file, starting empty");
                IssuerState::new(OffsetDateTime::now_utc())
            }
            Err(err) => return Err(map_load_error(err)),
        };
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            path,
        })
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, IssuerState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Invalid("action store mutex poisoned".to_string()))
    }

    /// Persists the locked state; called inside the critical section.
    fn persist(&self, guard: &MutexGuard<'_, IssuerState>) -> Result<(), StoreError> {
        snapshot::write_snapshot(&self.path, &**guard)
            .map_err(|err| StoreError::Persist(err.to_string()))
    }
}

/// Maps a snapshot load failure onto the store error taxonomy.
fn map_load_error(err: SnapshotError) -> StoreError {
    match err {
        SnapshotError::Deserialize(inner) => StoreError::Corrupt(inner.to_string()),
        other => StoreError::Persist(other.to_string()),
    }
}

impl ActionStore for FileActionStore {
    fn update_last_seen(&self) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.last_seen = OffsetDateTime::now_utc();
        self.persist(&guard)
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
        self.persist(&guard)
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
        self.persist(&guard)
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
        self.persist(&guard)
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
        self.persist(&guard)
    }
}
