// dmh-core/src/core/secret.rs
// ============================================================================
// Module: Secret Wire Shapes
// Description: Key upload and release payloads exchanged with the keeper.
// Purpose: Provide the shared secret shapes for issuer client and keeper API.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The issuer uploads one [`SecretUpload`] per action when the action is
//! created and reads back a [`SecretRelease`] once the keeper's silence gate
//! has opened. The `key` field carries serialized private key material and is
//! redacted from debug output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// At-rest envelope tag recorded per stored secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretEncryption {
    /// Envelope scheme tag.
    pub kind: String,
}

/// Key material uploaded to the keeper when an action is created.
///
/// # Invariants
/// - `key` is a serialized envelope private key and must not be logged.
/// - `process_after` is positive; the keeper validates it at admission.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretUpload {
    /// Serialized private key.
    pub key: String,
    /// Keeper-side silence gate in configured time units.
    pub process_after: u32,
}

impl fmt::Debug for SecretUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretUpload")
            .field("key", &"<redacted>")
            .field("process_after", &self.process_after)
            .finish()
    }
}

/// Released key material returned by the keeper after the gate opens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRelease {
    /// Serialized private key, decrypted from its at-rest form.
    pub key: String,
    /// Keeper-side silence gate in configured time units.
    pub process_after: u32,
    /// At-rest envelope tag of the stored record.
    #[serde(default)]
    pub encryption: Option<SecretEncryption>,
}

impl fmt::Debug for SecretRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRelease")
            .field("key", &"<redacted>")
            .field("process_after", &self.process_after)
            .field("encryption", &self.encryption)
            .finish()
    }
}
