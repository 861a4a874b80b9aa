// dmh-core/src/core/mod.rs
// ============================================================================
// Module: DMH Core Types
// Description: Canonical action, secret, time, and envelope structures.
// Purpose: Provide stable, serializable types shared by issuer and keeper.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Core types define the action data model (plaintext and encrypted forms),
//! the secret wire shapes exchanged with the keeper, the time-unit model used
//! by the release gates, and the crypto envelope. These types are the
//! canonical source of truth for the HTTP wire shapes and the persisted
//! state documents.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod action;
pub mod envelope;
pub mod secret;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use action::Action;
pub use action::ActionEncryption;
pub use action::EncryptedAction;
pub use action::IssuerState;
pub use action::ProcessedState;
pub use envelope::ENCRYPTION_KIND;
pub use envelope::EnvelopeError;
pub use envelope::EnvelopeIdentity;
pub use envelope::EnvelopeRecipient;
pub use secret::SecretEncryption;
pub use secret::SecretRelease;
pub use secret::SecretUpload;
pub use self::time::ProcessUnit;
pub use self::time::gate_open;
pub use self::time::throttle_open;
