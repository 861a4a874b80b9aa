// dmh-store-file/tests/action_store.rs
// ============================================================================
// Module: File Action Store Tests
// Description: Durability, ordering, and state transition checks.
// ============================================================================
//! ## Overview
//! Validates the issuer store against its persistence and monotonicity
//! contract: reload-after-write equals the in-memory state.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use dmh_core::ActionEncryption;
use dmh_core::EncryptedAction;
use dmh_core::ProcessedState;
use dmh_core::interfaces::ActionStore;
use dmh_store_file::FileActionStore;

fn sample(uuid: &str) -> EncryptedAction {
    EncryptedAction {
        kind: "dummy".to_string(),
        process_after: 1,
        min_interval: 0,
        comment: String::new(),
        data: "Y2lwaGVydGV4dA==".to_string(),
        uuid: uuid.to_string(),
        processed: ProcessedState::Unrun,
        last_run: None,
        encryption: ActionEncryption {
            kind: "X25519".to_string(),
            vault_url: format!("http://keeper.test/api/vault/store/client-1/{uuid}"),
        },
    }
}

#[test]
fn missing_file_opens_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileActionStore::open(dir.path().join("state.json")).unwrap();
    assert!(store.actions().unwrap().is_empty());
}

#[test]
fn malformed_file_refuses_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"not json at all").unwrap();
    assert!(FileActionStore::open(path).is_err());
}

#[test]
fn reload_after_write_equals_in_memory_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let store = FileActionStore::open(&path).unwrap();
    store.append_action(sample("a-1")).unwrap();
    store.append_action(sample("a-2")).unwrap();
    store.update_action_last_run("a-1").unwrap();
    store.set_processed("a-1", ProcessedState::Ran).unwrap();
    let before = store.actions().unwrap();

    let reopened = FileActionStore::open(&path).unwrap();
    assert_eq!(reopened.actions().unwrap(), before);
    assert_eq!(reopened.last_seen().unwrap(), store.last_seen().unwrap());
}

#[test]
fn actions_preserve_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileActionStore::open(dir.path().join("state.json")).unwrap();
    for uuid in ["a-1", "a-2", "a-3"] {
        store.append_action(sample(uuid)).unwrap();
    }
    let uuids: Vec<String> =
        store.actions().unwrap().into_iter().map(|action| action.uuid).collect();
    assert_eq!(uuids, vec!["a-1", "a-2", "a-3"]);

    let (index, found) = store.action("a-2").unwrap().unwrap();
    assert_eq!(index, 1);
    assert_eq!(found.uuid, "a-2");
}

#[test]
fn duplicate_uuid_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileActionStore::open(dir.path().join("state.json")).unwrap();
    store.append_action(sample("a-1")).unwrap();
    assert!(store.append_action(sample("a-1")).is_err());
}

#[test]
fn missing_uuid_reports_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileActionStore::open(dir.path().join("state.json")).unwrap();
    assert!(store.action("ghost").unwrap().is_none());
    assert!(store.remove_action("ghost").is_err());
    assert!(store.action_last_run("ghost").is_err());
    assert!(store.update_action_last_run("ghost").is_err());
    assert!(store.set_processed("ghost", ProcessedState::Ran).is_err());
}

#[test]
fn processed_state_is_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileActionStore::open(dir.path().join("state.json")).unwrap();
    store.append_action(sample("a-1")).unwrap();

    store.set_processed("a-1", ProcessedState::Ran).unwrap();
    store.set_processed("a-1", ProcessedState::Ran).unwrap();
    store.set_processed("a-1", ProcessedState::KeyDeleted).unwrap();
    assert!(store.set_processed("a-1", ProcessedState::Unrun).is_err());
    assert!(store.set_processed("a-1", ProcessedState::Ran).is_err());

    let (_, action) = store.action("a-1").unwrap().unwrap();
    assert_eq!(action.processed, ProcessedState::KeyDeleted);
}

#[test]
fn remove_action_persists_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let store = FileActionStore::open(&path).unwrap();
    store.append_action(sample("a-1")).unwrap();
    store.remove_action("a-1").unwrap();

    let reopened = FileActionStore::open(&path).unwrap();
    assert!(reopened.actions().unwrap().is_empty());
}

#[test]
fn update_last_seen_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let store = FileActionStore::open(&path).unwrap();
    let initial = store.last_seen().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));
    store.update_last_seen().unwrap();
    let updated = store.last_seen().unwrap();
    assert!(updated > initial);

    let reopened = FileActionStore::open(&path).unwrap();
    assert_eq!(reopened.last_seen().unwrap(), updated);
}
