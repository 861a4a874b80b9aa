// dmh-core/src/interfaces/mod.rs
// ============================================================================
// Module: DMH Interfaces
// Description: Backend-agnostic interfaces for storage, key vault, executors.
// Purpose: Define the contract surfaces used by the DMH runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the runtime integrates with persistence, the remote
//! keeper, executor plug-ins, and metrics without embedding backend detail.
//! Implementations must be deterministic where possible and fail closed on
//! missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::Action;
use crate::core::EncryptedAction;
use crate::core::ProcessedState;
use crate::core::SecretRelease;
use crate::core::SecretUpload;

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Executor errors.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// No executor is registered for the action kind.
    #[error("unknown action kind: {0}")]
    UnknownKind(String),
    /// The executor payload failed validation.
    #[error("invalid executor payload: {0}")]
    InvalidPayload(String),
    /// The executor ran and reported a delivery failure.
    #[error("executor failure: {0}")]
    Failed(String),
}

/// Delivery capability invoked when an action is released.
///
/// Implementations register by `kind` string; the dispatcher and the test
/// endpoint invoke this capability without knowing the concrete variant.
pub trait Executor: Send + Sync {
    /// Validates the action payload without delivering anything.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the kind is unknown or the payload is
    /// malformed.
    fn validate(&self, action: &Action) -> Result<(), ExecutorError>;

    /// Delivers the action.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when validation or delivery fails.
    fn run(&self, action: &Action) -> Result<(), ExecutorError>;
}

// ============================================================================
// SECTION: Action Store
// ============================================================================

/// Action store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No action exists for the UUID.
    #[error("missing action with uuid {uuid}")]
    NotFound {
        /// Requested action UUID.
        uuid: String,
    },
    /// Persisted state failed to parse or verify.
    #[error("action store corruption: {0}")]
    Corrupt(String),
    /// State could not be written durably; in-memory and on-disk state may
    /// have diverged and the process must treat this as fatal.
    #[error("action store persistence failure: {0}")]
    Persist(String),
    /// Invalid store operation or data.
    #[error("action store invalid operation: {0}")]
    Invalid(String),
}

/// Durable, crash-consistent record of encrypted actions and the issuer
/// heartbeat.
///
/// All operations are synchronous and persist before returning success.
/// Mutators serialise behind one lock that also covers the file replace, so
/// acknowledged mutations are never ahead of disk.
pub trait ActionStore: Send + Sync {
    /// Sets the owner heartbeat to now and persists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persist`] when the state cannot be written.
    fn update_last_seen(&self) -> Result<(), StoreError>;

    /// Returns the most recent owner heartbeat.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unreadable.
    fn last_seen(&self) -> Result<OffsetDateTime, StoreError>;

    /// Returns a consistent snapshot of all actions in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unreadable.
    fn actions(&self) -> Result<Vec<EncryptedAction>, StoreError>;

    /// Returns the action and its position, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unreadable.
    fn action(&self, uuid: &str) -> Result<Option<(usize, EncryptedAction)>, StoreError>;

    /// Appends a new encrypted action and persists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the UUID already exists or persistence
    /// fails.
    fn append_action(&self, action: EncryptedAction) -> Result<(), StoreError>;

    /// Removes the action and persists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when absent.
    fn remove_action(&self, uuid: &str) -> Result<(), StoreError>;

    /// Returns the most recent execution time, `None` when never run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when absent.
    fn action_last_run(&self, uuid: &str) -> Result<Option<OffsetDateTime>, StoreError>;

    /// Sets the action's last run to now and persists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when absent.
    fn update_action_last_run(&self, uuid: &str) -> Result<(), StoreError>;

    /// Advances the processing state and persists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when absent and
    /// [`StoreError::Invalid`] when the transition would regress the
    /// monotonic state.
    fn set_processed(&self, uuid: &str, state: ProcessedState) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Key Vault
// ============================================================================

/// Keeper-directed key vault errors.
#[derive(Debug, Error)]
pub enum KeyVaultError {
    /// The vault URL could not be composed or parsed.
    #[error("invalid vault url: {0}")]
    InvalidUrl(String),
    /// The keeper was unreachable or the request failed in transit.
    #[error("vault transport failure: {0}")]
    Transport(String),
    /// The keeper does not hold the secret.
    #[error("vault secret not found")]
    NotFound,
    /// The keeper holds the secret but the release gate is still closed.
    #[error("vault secret not released yet")]
    Locked,
    /// The keeper answered with an unexpected status.
    #[error("unexpected vault status code {0}")]
    UnexpectedStatus(u16),
    /// The keeper response body failed to decode.
    #[error("vault response decode failure: {0}")]
    Decode(String),
}

/// Client-side view of the keeper holding per-action private keys.
///
/// Operations target the absolute per-secret URL stored in the action's
/// encryption metadata so that later lifecycle steps hit exactly the record
/// created at add time.
pub trait KeyVault: Send + Sync {
    /// Composes the canonical per-secret URL for a new secret UUID.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::InvalidUrl`] when the configured base URL is
    /// unusable.
    fn secret_url(&self, secret_uuid: &str) -> Result<String, KeyVaultError>;

    /// Uploads key material; succeeds only on `201 Created`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError`] on transport failure or any other status.
    fn store_key(&self, url: &str, secret: &SecretUpload) -> Result<(), KeyVaultError>;

    /// Fetches released key material; succeeds only on `200 OK`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Locked`] while the gate is closed and
    /// [`KeyVaultError::NotFound`] when the record is absent.
    fn fetch_key(&self, url: &str) -> Result<SecretRelease, KeyVaultError>;

    /// Deletes key material. An already-absent record counts as success so
    /// the call stays idempotent across retries.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError`] on transport failure or a status other than
    /// success-or-absent.
    fn delete_key(&self, url: &str) -> Result<(), KeyVaultError>;

    /// Forwards an owner heartbeat to the keeper.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError`] when the keeper is unreachable or answers
    /// with a non-success status.
    fn forward_alive(&self) -> Result<(), KeyVaultError>;
}

// ============================================================================
// SECTION: Dispatch Metrics
// ============================================================================

/// Error classification recorded per dispatch step.
///
/// # Invariants
/// - Variants are stable for metric labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorKind {
    /// Reading the action's last run failed.
    LastRun,
    /// Fetching or opening the payload failed.
    Decrypt,
    /// The executor reported a failure.
    Execute,
    /// Persisting the new last run failed.
    UpdateLastRun,
    /// Advancing the processed state or deleting the key failed.
    MarkProcessed,
}

impl DispatchErrorKind {
    /// Returns the stable metric label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastRun => "last_run",
            Self::Decrypt => "decrypt",
            Self::Execute => "execute",
            Self::UpdateLastRun => "update_last_run",
            Self::MarkProcessed => "mark_processed",
        }
    }
}

/// Observability hook for per-action dispatch errors.
pub trait DispatchMetrics: Send + Sync {
    /// Records one dispatch error for the action.
    fn action_error(&self, action_uuid: &str, kind: DispatchErrorKind);
}

/// Metrics sink that discards all events; used in tests.
pub struct NoopDispatchMetrics;

impl DispatchMetrics for NoopDispatchMetrics {
    fn action_error(&self, _action_uuid: &str, _kind: DispatchErrorKind) {}
}
