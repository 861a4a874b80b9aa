// dmh-core/src/runtime/engine.rs
// ============================================================================
// Module: Action Lifecycle Engine
// Description: Creation, decryption, cleanup, and heartbeat forwarding.
// Purpose: Execute the action lifecycle over the store and vault interfaces.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The lifecycle engine is the single canonical mutation path for actions.
//! HTTP handlers and the dispatcher both call these methods so the ordering
//! guarantees hold regardless of the caller: a key reaches the keeper before
//! any ciphertext is persisted, and the terminal state is reached only after
//! the keeper confirms the key is gone.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroize;

use crate::core::Action;
use crate::core::ActionEncryption;
use crate::core::ENCRYPTION_KIND;
use crate::core::EncryptedAction;
use crate::core::EnvelopeError;
use crate::core::EnvelopeIdentity;
use crate::core::ProcessedState;
use crate::core::SecretUpload;
use crate::core::envelope;
use crate::interfaces::ActionStore;
use crate::interfaces::KeyVault;
use crate::interfaces::KeyVaultError;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Lifecycle engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Action store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Keeper-directed call failure.
    #[error(transparent)]
    Vault(#[from] KeyVaultError),
    /// Envelope failure.
    #[error(transparent)]
    Crypto(#[from] EnvelopeError),
}

// ============================================================================
// SECTION: Lifecycle Engine
// ============================================================================

/// Action lifecycle engine over an action store and a key vault.
pub struct LifecycleEngine<S, V> {
    /// Durable action store.
    store: S,
    /// Keeper-directed key vault client.
    vault: V,
}

impl<S: ActionStore, V: KeyVault> LifecycleEngine<S, V> {
    /// Creates a new engine.
    pub const fn new(store: S, vault: V) -> Self {
        Self {
            store,
            vault,
        }
    }

    /// Returns the underlying action store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Records an owner heartbeat locally, then forwards it to the keeper.
    ///
    /// The local update is kept even when forwarding fails; the caller
    /// surfaces the error so the operator retries, and the drift resolves on
    /// the next successful heartbeat.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the local update or the keeper forward
    /// fails.
    pub fn heartbeat(&self) -> Result<(), EngineError> {
        self.store.update_last_seen()?;
        self.vault.forward_alive()?;
        Ok(())
    }

    /// Encrypts and stores a new action, uploading its private key first.
    ///
    /// A fresh keypair seals the payload; the private key travels to the
    /// keeper exactly once and its serialized form is zeroized as soon as the
    /// upload returns. Nothing is persisted unless the keeper acknowledged
    /// with `201 Created`, so a failed upload leaves no local record. The
    /// reverse failure (upload succeeded, local persistence failed) leaves an
    /// orphan key that decrypts nothing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when encryption, the upload, or persistence
    /// fails.
    pub fn add_action(&self, action: Action) -> Result<EncryptedAction, EngineError> {
        let identity = EnvelopeIdentity::generate();
        let uuid = Uuid::new_v4().to_string();
        let vault_url = self.vault.secret_url(&uuid)?;
        let ciphertext = envelope::encrypt(&identity.recipient(), &action.data)?;

        let mut upload = SecretUpload {
            key: identity.encoded_private_key().to_string(),
            process_after: action.process_after,
        };
        let uploaded = self.vault.store_key(&vault_url, &upload);
        upload.key.zeroize();
        drop(identity);
        uploaded?;

        let encrypted = EncryptedAction {
            kind: action.kind,
            process_after: action.process_after,
            min_interval: action.min_interval,
            comment: action.comment,
            data: ciphertext,
            uuid,
            processed: ProcessedState::Unrun,
            last_run: None,
            encryption: ActionEncryption {
                kind: ENCRYPTION_KIND.to_string(),
                vault_url,
            },
        };
        self.store.append_action(encrypted.clone())?;
        Ok(encrypted)
    }

    /// Removes an action locally without contacting the keeper.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the action is absent or persistence
    /// fails.
    pub fn delete_action(&self, uuid: &str) -> Result<(), EngineError> {
        self.store.remove_action(uuid)?;
        Ok(())
    }

    /// Fetches the released private key and returns the plaintext action.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the action is absent, the keeper refuses
    /// the key, or decryption fails.
    pub fn decrypt_action(&self, uuid: &str) -> Result<Action, EngineError> {
        let (_, encrypted) = self.require_action(uuid)?;
        let release = self.vault.fetch_key(&encrypted.encryption.vault_url)?;
        let identity = EnvelopeIdentity::parse(&release.key)?;
        let data = envelope::decrypt(&identity, &encrypted.data)?;
        Ok(Action {
            kind: encrypted.kind,
            process_after: encrypted.process_after,
            min_interval: encrypted.min_interval,
            comment: encrypted.comment,
            data,
        })
    }

    /// Advances an executed action to its terminal state.
    ///
    /// Persists state 1 before issuing the keeper DELETE and state 2 after:
    /// a crash in between is healed on the next tick because the DELETE is
    /// idempotent (an absent key counts as deleted). Calling this on an
    /// already-terminal action is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the action is absent, persistence fails,
    /// or the keeper refuses the delete.
    pub fn mark_processed(&self, uuid: &str) -> Result<(), EngineError> {
        let (_, encrypted) = self.require_action(uuid)?;
        if encrypted.processed == ProcessedState::KeyDeleted {
            return Ok(());
        }
        self.store.set_processed(uuid, ProcessedState::Ran)?;
        self.vault.delete_key(&encrypted.encryption.vault_url)?;
        self.store.set_processed(uuid, ProcessedState::KeyDeleted)?;
        Ok(())
    }

    /// Looks up an action, mapping absence to the store's not-found error.
    fn require_action(&self, uuid: &str) -> Result<(usize, EncryptedAction), EngineError> {
        self.store.action(uuid)?.ok_or_else(|| {
            EngineError::Store(StoreError::NotFound {
                uuid: uuid.to_string(),
            })
        })
    }
}
