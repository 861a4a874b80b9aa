// dmh-core/src/core/action.rs
// ============================================================================
// Module: Action Data Model
// Description: Plaintext and encrypted action records plus issuer state.
// Purpose: Provide the canonical action lifecycle types and wire shapes.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! An [`Action`] carries a plaintext executor payload and exists only in
//! memory, at creation or test time. Everything that is persisted or exposed
//! over HTTP is an [`EncryptedAction`], whose `data` field holds the envelope
//! ciphertext. [`IssuerState`] is the single persisted issuer document.
//! Security posture: plaintext `data` must never reach a state file or a log
//! line.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde::de;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Plaintext Action
// ============================================================================

/// User-defined action with a plaintext executor payload.
///
/// # Invariants
/// - Exists in memory only; never serialized to disk.
/// - `data` is the executor-specific JSON payload and is treated as secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Action {
    /// Executor discriminant (e.g. "json_post").
    pub kind: String,
    /// Silence gate in configured time units; must be positive.
    pub process_after: u32,
    /// Re-fire gate in configured time units; zero makes the action one-shot.
    pub min_interval: u32,
    /// Operator comment, stored and exposed in cleartext.
    pub comment: String,
    /// Executor payload as JSON text; encrypted before persistence.
    pub data: String,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("kind", &self.kind)
            .field("process_after", &self.process_after)
            .field("min_interval", &self.min_interval)
            .field("comment", &self.comment)
            .field("data", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// SECTION: Processing State
// ============================================================================

/// Per-action processing progress.
///
/// # Invariants
/// - Serialized as the integer codes 0, 1, 2.
/// - Transitions are monotonic non-decreasing; stores reject regressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProcessedState {
    /// Never executed.
    Unrun,
    /// Executed; private key may still be held by the keeper.
    Ran,
    /// Executed and the keeper no longer holds the private key. Terminal.
    KeyDeleted,
}

impl ProcessedState {
    /// Returns the stable integer code for the state.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Unrun => 0,
            Self::Ran => 1,
            Self::KeyDeleted => 2,
        }
    }

    /// Parses an integer code into a state.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unrun),
            1 => Some(Self::Ran),
            2 => Some(Self::KeyDeleted),
            _ => None,
        }
    }

    /// Returns true when advancing to `next` keeps the state monotonic.
    #[must_use]
    pub fn permits(self, next: Self) -> bool {
        next >= self
    }
}

impl Serialize for ProcessedState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for ProcessedState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("invalid processed state code {code}")))
    }
}

// ============================================================================
// SECTION: Encrypted Action
// ============================================================================

/// Envelope metadata attached to an encrypted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEncryption {
    /// Envelope scheme tag.
    pub kind: String,
    /// Absolute URL of the per-action key record on the keeper.
    pub vault_url: String,
}

/// Persisted action record with an encrypted payload.
///
/// # Invariants
/// - `uuid` is unique within an issuer instance and immutable.
/// - `data` (the ciphertext) is immutable once stored.
/// - Only `processed` and `last_run` may change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedAction {
    /// Executor discriminant.
    pub kind: String,
    /// Silence gate in configured time units.
    pub process_after: u32,
    /// Re-fire gate in configured time units.
    pub min_interval: u32,
    /// Operator comment, cleartext.
    #[serde(default)]
    pub comment: String,
    /// Base64 envelope ciphertext of the executor payload.
    pub data: String,
    /// Action identifier assigned at creation.
    pub uuid: String,
    /// Processing progress.
    pub processed: ProcessedState,
    /// Most recent execution time; `None` when the action never ran.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_run: Option<OffsetDateTime>,
    /// Envelope metadata.
    pub encryption: ActionEncryption,
}

// ============================================================================
// SECTION: Issuer State Document
// ============================================================================

/// Singleton issuer state: last heartbeat plus the ordered action list.
///
/// # Invariants
/// - `actions` preserves insertion order; the dispatcher iterates in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerState {
    /// Most recent owner heartbeat.
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    /// Encrypted actions in insertion order.
    pub actions: Vec<EncryptedAction>,
}

impl IssuerState {
    /// Returns a fresh state with `last_seen` set to the given instant.
    #[must_use]
    pub const fn new(last_seen: OffsetDateTime) -> Self {
        Self {
            last_seen,
            actions: Vec::new(),
        }
    }
}
