//! File fingerprints: the persisted file-level view of the index.
//!
//! A fingerprint records `{ contentHash, mtime, size }` per relative path.
//! Identity is the path; change detection is by content hash, with mtime
//! and size kept as advisory fields. The store persists as one compact
//! JSON file written atomically (temp file + rename) so a crash can never
//! leave a half-written fingerprint map behind.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum FingerprintError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Corrupt fingerprint file: {0}")]
  Corrupt(#[from] serde_json::Error),
}

/// Per-file fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFingerprint {
  pub content_hash: String,
  /// Advisory; seconds since the epoch.
  pub mtime: i64,
  /// Advisory; bytes.
  pub size: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedFingerprints {
  fingerprints: HashMap<String, FileFingerprint>,
}

/// File-level delta between a scan and the persisted fingerprints.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FileDelta {
  pub added: Vec<String>,
  pub modified: Vec<String>,
  pub unchanged: Vec<String>,
  pub removed: Vec<String>,
}

impl FileDelta {
  pub fn change_count(&self) -> usize {
    self.added.len() + self.modified.len() + self.removed.len()
  }

  pub fn has_changes(&self) -> bool {
    self.change_count() > 0
  }
}

/// The fingerprint map plus its persistence location.
#[derive(Debug)]
pub struct FingerprintStore {
  file_path: PathBuf,
  map: HashMap<String, FileFingerprint>,
}

impl FingerprintStore {
  /// Load the store from disk; a missing file yields an empty store, a
  /// corrupt file is an error (the caller decides whether to rebuild).
  pub fn load(file_path: PathBuf) -> Result<Self, FingerprintError> {
    let map = if file_path.exists() {
      let raw = std::fs::read_to_string(&file_path)?;
      let persisted: PersistedFingerprints = serde_json::from_str(&raw)?;
      persisted.fingerprints
    } else {
      HashMap::new()
    };

    debug!(path = %file_path.display(), entries = map.len(), "Fingerprints loaded");
    Ok(Self { file_path, map })
  }

  /// Write the store atomically: serialize to `<file>.tmp`, then rename.
  pub fn persist(&self) -> Result<(), FingerprintError> {
    if let Some(parent) = self.file_path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let persisted = PersistedFingerprints {
      fingerprints: self.map.clone(),
    };
    let json = serde_json::to_string(&persisted)?;

    let tmp = self.file_path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)?;
    if let Err(e) = std::fs::rename(&tmp, &self.file_path) {
      warn!(path = %self.file_path.display(), error = %e, "Atomic rename failed, removing temp file");
      let _ = std::fs::remove_file(&tmp);
      return Err(e.into());
    }

    Ok(())
  }

  pub fn get(&self, path: &str) -> Option<&FileFingerprint> {
    self.map.get(path)
  }

  pub fn has(&self, path: &str) -> bool {
    self.map.contains_key(path)
  }

  pub fn insert(&mut self, path: String, fingerprint: FileFingerprint) {
    self.map.insert(path, fingerprint);
  }

  pub fn remove(&mut self, path: &str) -> Option<FileFingerprint> {
    self.map.remove(path)
  }

  pub fn len(&self) -> usize {
    self.map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }

  pub fn paths(&self) -> impl Iterator<Item = &String> {
    self.map.keys()
  }

  pub fn clear(&mut self) {
    self.map.clear();
  }

  /// Compute the file delta against an observed scan of `path -> hash`.
  ///
  /// Every scanned path is classified as added / modified / unchanged, and
  /// every fingerprint not in the scan is removed.
  pub fn delta(&self, scan: &HashMap<String, String>) -> FileDelta {
    let mut delta = FileDelta::default();

    for (path, hash) in scan {
      match self.map.get(path) {
        None => delta.added.push(path.clone()),
        Some(fp) if fp.content_hash != *hash => delta.modified.push(path.clone()),
        Some(_) => delta.unchanged.push(path.clone()),
      }
    }

    for path in self.map.keys() {
      if !scan.contains_key(path) {
        delta.removed.push(path.clone());
      }
    }

    // Deterministic ordering for logs and tests.
    delta.added.sort();
    delta.modified.sort();
    delta.unchanged.sort();
    delta.removed.sort();
    delta
  }
}

/// Fingerprint the file currently at `abs_path`.
pub fn fingerprint_file(abs_path: &Path, content_hash: String) -> FileFingerprint {
  let meta = std::fs::metadata(abs_path).ok();
  let mtime = meta
    .as_ref()
    .and_then(|m| m.modified().ok())
    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
    .map(|d| d.as_secs() as i64)
    .unwrap_or(0);
  let size = meta.map(|m| m.len()).unwrap_or(0);

  FileFingerprint {
    content_hash,
    mtime,
    size,
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use tempfile::TempDir;

  use super::*;

  fn store_in(temp: &TempDir) -> FingerprintStore {
    FingerprintStore::load(temp.path().join("fingerprints.json")).unwrap()
  }

  fn fp(hash: &str) -> FileFingerprint {
    FileFingerprint {
      content_hash: hash.to_string(),
      mtime: 1000,
      size: 42,
    }
  }

  #[test]
  fn test_load_missing_is_empty() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    assert!(store.is_empty());
  }

  #[test]
  fn test_persist_and_reload() {
    let temp = TempDir::new().unwrap();
    let mut store = store_in(&temp);
    store.insert("src/a.rs".to_string(), fp("h1"));
    store.insert("src/b.rs".to_string(), fp("h2"));
    store.persist().unwrap();

    let reloaded = store_in(&temp);
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.get("src/a.rs").unwrap().content_hash, "h1");
  }

  #[test]
  fn test_persisted_shape() {
    let temp = TempDir::new().unwrap();
    let mut store = store_in(&temp);
    store.insert("a.rs".to_string(), fp("h1"));
    store.persist().unwrap();

    let raw = std::fs::read_to_string(temp.path().join("fingerprints.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entry = &value["fingerprints"]["a.rs"];
    assert_eq!(entry["contentHash"], "h1");
    assert_eq!(entry["mtime"], 1000);
    assert_eq!(entry["size"], 42);
  }

  #[test]
  fn test_corrupt_file_is_error() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("fingerprints.json"), "{not json").unwrap();
    assert!(FingerprintStore::load(temp.path().join("fingerprints.json")).is_err());
  }

  #[test]
  fn test_delta_classification() {
    let temp = TempDir::new().unwrap();
    let mut store = store_in(&temp);
    store.insert("same.rs".to_string(), fp("same-hash"));
    store.insert("changed.rs".to_string(), fp("old-hash"));
    store.insert("gone.rs".to_string(), fp("gone-hash"));

    let mut scan = HashMap::new();
    scan.insert("same.rs".to_string(), "same-hash".to_string());
    scan.insert("changed.rs".to_string(), "new-hash".to_string());
    scan.insert("fresh.rs".to_string(), "fresh-hash".to_string());

    let delta = store.delta(&scan);
    assert_eq!(delta.added, vec!["fresh.rs"]);
    assert_eq!(delta.modified, vec!["changed.rs"]);
    assert_eq!(delta.unchanged, vec!["same.rs"]);
    assert_eq!(delta.removed, vec!["gone.rs"]);
    assert_eq!(delta.change_count(), 3);
  }

  #[test]
  fn test_delta_empty_scan_removes_all() {
    let temp = TempDir::new().unwrap();
    let mut store = store_in(&temp);
    store.insert("a.rs".to_string(), fp("h"));

    let delta = store.delta(&HashMap::new());
    assert_eq!(delta.removed, vec!["a.rs"]);
    assert!(!delta.removed.is_empty() && delta.added.is_empty());
  }

  #[test]
  fn test_no_temp_file_left_behind() {
    let temp = TempDir::new().unwrap();
    let mut store = store_in(&temp);
    store.insert("a.rs".to_string(), fp("h"));
    store.persist().unwrap();

    assert!(!temp.path().join("fingerprints.json.tmp").exists());
  }
}
