// dmh-store-file/src/snapshot.rs
// ============================================================================
// Module: Atomic JSON Snapshots
// Description: Write-temp-then-rename persistence for state documents.
// Purpose: Guarantee that on-disk state is always one complete document.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A snapshot write creates a temp file next to the target, writes the full
//! JSON document, fsyncs the data, renames over the target, and fsyncs the
//! parent directory. A crash at any point leaves either the old complete
//! document or the new complete document, never a partial write. Reads treat
//! a missing file as empty state and a malformed file as corruption the
//! caller must treat as fatal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Snapshot persistence errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The target path has no parent directory for the temp file.
    #[error("snapshot path has no parent directory: {}", path.display())]
    NoParentDirectory {
        /// Path with no parent.
        path: PathBuf,
    },
    /// JSON serialization failed.
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),
    /// Persisted document failed to parse.
    #[error("snapshot deserialization failed: {0}")]
    Deserialize(#[source] serde_json::Error),
    /// I/O failure during the write or rename protocol.
    #[error("snapshot i/o failure during {context}: {source}")]
    Io {
        /// Operation that failed.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl SnapshotError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

// ============================================================================
// SECTION: Snapshot Operations
// ============================================================================

/// Atomically replaces `path` with the JSON serialization of `value`.
///
/// # Errors
///
/// Returns [`SnapshotError`] when serialization or any step of the
/// temp-write/fsync/rename protocol fails.
pub fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<(), SnapshotError> {
    let parent = match path.parent() {
        None => {
            return Err(SnapshotError::NoParentDirectory {
                path: path.to_path_buf(),
            });
        }
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
    };
    let document = serde_json::to_vec_pretty(value).map_err(SnapshotError::Serialize)?;

    let temp_path = temp_path_for(path);
    let mut temp = File::create(&temp_path)
        .map_err(|err| SnapshotError::io("temp file create", err))?;
    temp.write_all(&document).map_err(|err| SnapshotError::io("temp file write", err))?;
    temp.sync_all().map_err(|err| SnapshotError::io("temp file fsync", err))?;
    drop(temp);

    fs::rename(&temp_path, path).map_err(|err| SnapshotError::io("rename", err))?;

    // Persist the rename itself; best effort on platforms where directories
    // cannot be opened for sync.
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// Reads the JSON document at `path`.
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns [`SnapshotError::Deserialize`] when the document fails to parse
/// and [`SnapshotError::Io`] for other read failures.
pub fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, SnapshotError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(SnapshotError::io("read", err)),
    };
    serde_json::from_slice(&bytes).map(Some).map_err(SnapshotError::Deserialize)
}

/// Returns the temp path used for the atomic replace of `path`.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map_or_else(
        || std::ffi::OsString::from("snapshot"),
        std::ffi::OsStr::to_os_string,
    );
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut value = BTreeMap::new();
        value.insert("alpha".to_string(), 1u32);

        write_snapshot(&path, &value).unwrap();
        let loaded: BTreeMap<String, u32> = read_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let loaded: Option<BTreeMap<String, u32>> = read_snapshot(&path).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn malformed_document_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let result: Result<Option<BTreeMap<String, u32>>, _> = read_snapshot(&path);
        assert!(matches!(result, Err(SnapshotError::Deserialize(_))));
    }

    #[test]
    fn rewrite_replaces_the_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_snapshot(&path, &vec!["first".to_string()]).unwrap();
        write_snapshot(&path, &vec!["second".to_string()]).unwrap();
        let loaded: Vec<String> = read_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded, vec!["second".to_string()]);
    }
}
