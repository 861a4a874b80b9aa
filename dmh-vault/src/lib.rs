// dmh-vault/src/lib.rs
// ============================================================================
// Module: DMH Vault Library
// Description: Keeper secret store with per-client liveness tracking.
// Purpose: Guard per-action private keys until silence releases them.
// Dependencies: dmh-core, dmh-store-file
// ============================================================================

//! ## Overview
//! The vault holds one private key per (client, secret) pair, encrypted at
//! rest with the keeper's master key. A key is released only after the
//! client's own silence interval elapses; reads and deletes share the same
//! gate. Inserts are immutable: an existing record is never overwritten.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod vault;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use vault::ClientRecord;
pub use vault::StoredSecret;
pub use vault::Vault;
pub use vault::VaultError;
