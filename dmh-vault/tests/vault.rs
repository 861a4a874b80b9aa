// dmh-vault/tests/vault.rs
// ============================================================================
// Module: Vault Tests
// Description: Release gate, immutability, and at-rest encryption checks.
// ============================================================================
//! ## Overview
//! Validates the keeper store contract: immutable inserts, strict release
//! gating shared by reads and deletes, and at-rest encryption of held keys.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::path::Path;
use std::path::PathBuf;

use dmh_core::EnvelopeIdentity;
use dmh_core::ProcessUnit;
use dmh_core::SecretUpload;
use dmh_vault::Vault;
use dmh_vault::VaultError;
use time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

fn master_key() -> String {
    EnvelopeIdentity::generate().encoded_private_key().to_string()
}

fn upload() -> SecretUpload {
    SecretUpload {
        key: EnvelopeIdentity::generate().encoded_private_key().to_string(),
        process_after: 1,
    }
}

/// Writes a vault document whose client went silent `silent_for` ago.
fn seed_silent_client(
    path: &Path,
    master: &str,
    client: &str,
    secret: &str,
    wire_key: &str,
    silent_for: Duration,
) {
    let staging: PathBuf = path.with_extension("staging.json");
    let vault = Vault::open(master, &staging, ProcessUnit::Second).unwrap();
    vault
        .add_secret(client, secret, &SecretUpload {
            key: wire_key.to_string(),
            process_after: 1,
        })
        .unwrap();
    drop(vault);

    // Rewind the persisted heartbeat so the gate is already open.
    let mut doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&staging).unwrap()).unwrap();
    let rewound = (OffsetDateTime::now_utc() - silent_for).format(&Rfc3339).unwrap();
    doc[client]["last_seen"] = serde_json::Value::String(rewound);
    std::fs::write(path, serde_json::to_vec(&doc).unwrap()).unwrap();
}

#[test]
fn fresh_secret_is_locked() {
    let dir = tempfile::tempdir().unwrap();
    let vault =
        Vault::open(&master_key(), dir.path().join("vault.json"), ProcessUnit::Second).unwrap();
    vault.add_secret("client-1", "secret-1", &upload()).unwrap();

    let result = vault.get_secret("client-1", "secret-1");
    assert!(matches!(result, Err(VaultError::NotReleased { .. })));
}

#[test]
fn duplicate_insert_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let vault =
        Vault::open(&master_key(), dir.path().join("vault.json"), ProcessUnit::Second).unwrap();
    vault.add_secret("client-1", "secret-1", &upload()).unwrap();

    let result = vault.add_secret("client-1", "secret-1", &upload());
    assert!(matches!(result, Err(VaultError::AlreadyExists { .. })));
}

#[test]
fn missing_secret_reports_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let vault =
        Vault::open(&master_key(), dir.path().join("vault.json"), ProcessUnit::Second).unwrap();
    assert!(matches!(
        vault.get_secret("client-1", "ghost"),
        Err(VaultError::NotFound { .. })
    ));
    assert!(matches!(
        vault.delete_secret("client-1", "ghost"),
        Err(VaultError::NotFound { .. })
    ));
}

#[test]
fn stored_key_never_equals_wire_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let vault = Vault::open(&master_key(), &path, ProcessUnit::Second).unwrap();
    let secret = upload();
    vault.add_secret("client-1", "secret-1", &secret).unwrap();

    let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    let stored = doc["client-1"]["secrets"]["secret-1"]["key"].as_str().unwrap();
    assert_ne!(stored, secret.key);
    assert_eq!(doc["client-1"]["secrets"]["secret-1"]["encryption"]["kind"], "X25519");
}

#[test]
fn silence_releases_the_original_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let master = master_key();
    let wire_key = EnvelopeIdentity::generate().encoded_private_key().to_string();
    seed_silent_client(&path, &master, "client-1", "secret-1", &wire_key, Duration::seconds(60));

    let vault = Vault::open(&master, &path, ProcessUnit::Second).unwrap();
    let released = vault.get_secret("client-1", "secret-1").unwrap();
    assert_eq!(released.key, wire_key);
    assert_eq!(released.process_after, 1);
}

#[test]
fn heartbeat_closes_the_gate_again() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let master = master_key();
    let wire_key = EnvelopeIdentity::generate().encoded_private_key().to_string();
    seed_silent_client(&path, &master, "client-1", "secret-1", &wire_key, Duration::seconds(60));

    let vault = Vault::open(&master, &path, ProcessUnit::Second).unwrap();
    vault.get_secret("client-1", "secret-1").unwrap();
    vault.update_last_seen("client-1").unwrap();
    assert!(matches!(
        vault.get_secret("client-1", "secret-1"),
        Err(VaultError::NotReleased { .. })
    ));
}

#[test]
fn delete_shares_the_release_gate() {
    let dir = tempfile::tempdir().unwrap();
    let vault =
        Vault::open(&master_key(), dir.path().join("vault.json"), ProcessUnit::Second).unwrap();
    vault.add_secret("client-1", "secret-1", &upload()).unwrap();
    assert!(matches!(
        vault.delete_secret("client-1", "secret-1"),
        Err(VaultError::NotReleased { .. })
    ));
}

#[test]
fn released_secret_can_be_deleted_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let master = master_key();
    let wire_key = EnvelopeIdentity::generate().encoded_private_key().to_string();
    seed_silent_client(&path, &master, "client-1", "secret-1", &wire_key, Duration::seconds(60));

    let vault = Vault::open(&master, &path, ProcessUnit::Second).unwrap();
    vault.delete_secret("client-1", "secret-1").unwrap();
    assert!(matches!(
        vault.delete_secret("client-1", "secret-1"),
        Err(VaultError::NotFound { .. })
    ));
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let master = master_key();
    let vault = Vault::open(&master, &path, ProcessUnit::Second).unwrap();
    vault.add_secret("client-1", "secret-1", &upload()).unwrap();
    vault.update_last_seen("client-2").unwrap();
    drop(vault);

    let reopened = Vault::open(&master, &path, ProcessUnit::Second).unwrap();
    assert!(matches!(
        reopened.get_secret("client-1", "secret-1"),
        Err(VaultError::NotReleased { .. })
    ));
    assert!(matches!(
        reopened.get_secret("client-2", "ghost"),
        Err(VaultError::NotFound { .. })
    ));
}

#[test]
fn malformed_state_refuses_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.json");
    std::fs::write(&path, b"[1, 2, oops").unwrap();
    assert!(matches!(
        Vault::open(&master_key(), &path, ProcessUnit::Second),
        Err(VaultError::Corrupt(_))
    ));
}

#[test]
fn invalid_master_key_refuses_to_open() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Vault::open("not a key", dir.path().join("vault.json"), ProcessUnit::Second),
        Err(VaultError::Crypto(_))
    ));
}
