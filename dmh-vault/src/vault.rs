// dmh-vault/src/vault.rs
// ============================================================================
// Module: Keeper Secret Store
// Description: Per-client liveness tracking and time-gated key release.
// Purpose: Release a held key only after the client's silence interval.
// Dependencies: dmh-core, dmh-store-file, serde
// ============================================================================

//! ## Overview
//! The vault maps client UUIDs to their heartbeat and a set of held secrets.
//! Incoming key material is envelope-encrypted with the master identity
//! before it touches memory that outlives the request, so the persisted
//! `key` field never equals the wire form. The release gate is strict: at
//! exactly the boundary the secret stays locked. All mutators persist the
//! whole document atomically inside the store mutex.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use dmh_core::ENCRYPTION_KIND;
use dmh_core::EnvelopeError;
use dmh_core::EnvelopeIdentity;
use dmh_core::ProcessUnit;
use dmh_core::SecretEncryption;
use dmh_core::SecretRelease;
use dmh_core::SecretUpload;
use dmh_core::envelope;
use dmh_core::gate_open;
use dmh_store_file::SnapshotError;
use dmh_store_file::read_snapshot;
use dmh_store_file::write_snapshot;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

// ============================================================================
// SECTION: Persisted Records
// ============================================================================

/// One held secret in its at-rest form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSecret {
    /// Private key material, envelope-encrypted with the master key.
    pub key: String,
    /// Client silence gate in configured time units.
    pub process_after: u32,
    /// At-rest envelope tag.
    pub encryption: SecretEncryption,
}

/// Per-client record: heartbeat plus held secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Most recent heartbeat from the client.
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    /// Held secrets keyed by secret UUID.
    pub secrets: BTreeMap<String, StoredSecret>,
}

impl ClientRecord {
    /// Returns a fresh record, seen now and holding nothing.
    fn materialized() -> Self {
        Self {
            last_seen: OffsetDateTime::now_utc(),
            secrets: BTreeMap::new(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Vault errors.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No secret exists for the (client, secret) pair.
    #[error("secret {client}/{secret} is missing")]
    NotFound {
        /// Client UUID.
        client: String,
        /// Secret UUID.
        secret: String,
    },
    /// A secret already exists for the (client, secret) pair.
    #[error("secret {client}/{secret} already exists")]
    AlreadyExists {
        /// Client UUID.
        client: String,
        /// Secret UUID.
        secret: String,
    },
    /// The release gate is still closed.
    #[error("secret {client}/{secret} is not released yet")]
    NotReleased {
        /// Client UUID.
        client: String,
        /// Secret UUID.
        secret: String,
    },
    /// At-rest envelope failure.
    #[error(transparent)]
    Crypto(#[from] EnvelopeError),
    /// Persisted document failed to parse.
    #[error("vault state corruption: {0}")]
    Corrupt(String),
    /// State could not be written durably; treated as fatal by callers.
    #[error("vault persistence failure: {0}")]
    Persist(String),
    /// Invalid vault operation.
    #[error("vault invalid operation: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Vault
// ============================================================================

/// Keeper secret store.
pub struct Vault {
    /// Client records protected by a mutex that also covers the file replace.
    clients: Mutex<BTreeMap<String, ClientRecord>>,
    /// Master identity encrypting every stored key.
    master: EnvelopeIdentity,
    /// Snapshot path.
    path: PathBuf,
    /// Time unit scaling each secret's silence gate.
    unit: ProcessUnit,
}

impl Vault {
    /// Opens the vault, loading a previously saved snapshot when present.
    ///
    /// The unit is at least one second by construction of [`ProcessUnit`].
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] when the master key fails to parse and
    /// [`VaultError::Corrupt`] when a present snapshot is malformed; startup
    /// must treat both as fatal.
    pub fn open(
        master_key: &str,
        path: impl Into<PathBuf>,
        unit: ProcessUnit,
    ) -> Result<Self, VaultError> {
        let master = EnvelopeIdentity::parse(master_key)?;
        let path = path.into();
        let clients = match read_snapshot::<BTreeMap<String, ClientRecord>>(&path) {
            Ok(Some(clients)) => clients,
            Ok(None) => {
                info!(path = %path.display(), "no vault state file, starting empty");
                BTreeMap::new()
            }
            Err(SnapshotError::Deserialize(err)) => {
                return Err(VaultError::Corrupt(err.to_string()));
            }
            Err(err) => return Err(VaultError::Persist(err.to_string())),
        };
        Ok(Self {
            clients: Mutex::new(clients),
            master,
            path,
            unit,
        })
    }

    /// Records a client heartbeat, materialising the client when absent.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Persist`] when the state cannot be written.
    pub fn update_last_seen(&self, client_uuid: &str) -> Result<(), VaultError> {
        let mut guard = self.lock()?;
        let record =
            guard.entry(client_uuid.to_string()).or_insert_with(ClientRecord::materialized);
        record.last_seen = OffsetDateTime::now_utc();
        self.persist(&guard)
    }

    /// Stores new key material for the (client, secret) pair.
    ///
    /// The pair is immutable: an existing record is refused, never
    /// overwritten. The key is encrypted with the master identity before it
    /// is stored.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::AlreadyExists`] on duplicates and
    /// [`VaultError::Persist`] when the state cannot be written.
    pub fn add_secret(
        &self,
        client_uuid: &str,
        secret_uuid: &str,
        upload: &SecretUpload,
    ) -> Result<(), VaultError> {
        let sealed = envelope::encrypt(&self.master.recipient(), &upload.key)?;
        let mut guard = self.lock()?;
        let record =
            guard.entry(client_uuid.to_string()).or_insert_with(ClientRecord::materialized);
        if record.secrets.contains_key(secret_uuid) {
            return Err(VaultError::AlreadyExists {
                client: client_uuid.to_string(),
                secret: secret_uuid.to_string(),
            });
        }
        record.secrets.insert(secret_uuid.to_string(), StoredSecret {
            key: sealed,
            process_after: upload.process_after,
            encryption: SecretEncryption {
                kind: ENCRYPTION_KIND.to_string(),
            },
        });
        self.persist(&guard)
    }

    /// Returns the released key for the (client, secret) pair.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] when absent,
    /// [`VaultError::NotReleased`] while the client's silence gate is still
    /// closed, and [`VaultError::Crypto`] when the at-rest envelope fails to
    /// open.
    pub fn get_secret(
        &self,
        client_uuid: &str,
        secret_uuid: &str,
    ) -> Result<SecretRelease, VaultError> {
        let guard = self.lock()?;
        let secret = released_secret(&guard, client_uuid, secret_uuid, self.unit)?;
        let key = envelope::decrypt(&self.master, &secret.key)?;
        Ok(SecretRelease {
            key,
            process_after: secret.process_after,
            encryption: Some(secret.encryption.clone()),
        })
    }

    /// Deletes the (client, secret) pair after the release gate opens.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] when absent and
    /// [`VaultError::NotReleased`] while the gate is still closed.
    pub fn delete_secret(&self, client_uuid: &str, secret_uuid: &str) -> Result<(), VaultError> {
        let mut guard = self.lock()?;
        released_secret(&guard, client_uuid, secret_uuid, self.unit)?;
        if let Some(record) = guard.get_mut(client_uuid) {
            record.secrets.remove(secret_uuid);
        }
        self.persist(&guard)
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, ClientRecord>>, VaultError> {
        self.clients
            .lock()
            .map_err(|_| VaultError::Invalid("vault mutex poisoned".to_string()))
    }

    /// Persists the locked state; called inside the critical section.
    fn persist(
        &self,
        guard: &MutexGuard<'_, BTreeMap<String, ClientRecord>>,
    ) -> Result<(), VaultError> {
        write_snapshot(&self.path, &**guard).map_err(|err| VaultError::Persist(err.to_string()))
    }
}

/// Looks up a secret and applies the release gate.
fn released_secret<'a>(
    clients: &'a BTreeMap<String, ClientRecord>,
    client_uuid: &str,
    secret_uuid: &str,
    unit: ProcessUnit,
) -> Result<&'a StoredSecret, VaultError> {
    let not_found = || VaultError::NotFound {
        client: client_uuid.to_string(),
        secret: secret_uuid.to_string(),
    };
    let record = clients.get(client_uuid).ok_or_else(not_found)?;
    let secret = record.secrets.get(secret_uuid).ok_or_else(not_found)?;
    let now = OffsetDateTime::now_utc();
    if !gate_open(now, record.last_seen, secret.process_after, unit) {
        return Err(VaultError::NotReleased {
            client: client_uuid.to_string(),
            secret: secret_uuid.to_string(),
        });
    }
    Ok(secret)
}
