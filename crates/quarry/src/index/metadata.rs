//! Persisted index metadata (`metadata.json`).

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::FingerprintError;

/// Descriptive state of an index, persisted beside the stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
  pub project_path: String,
  pub created_at: DateTime<Utc>,
  pub last_full_index: Option<DateTime<Utc>>,
  pub last_incremental_update: Option<DateTime<Utc>>,
  pub model_name: String,
  pub embedding_dimension: usize,
  pub total_files: usize,
  pub total_chunks: usize,
  pub storage_size_bytes: u64,
  pub fts_engine_type: String,
}

impl IndexMetadata {
  pub fn new(project_path: &Path, model_name: &str, embedding_dimension: usize, fts_engine_type: &str) -> Self {
    Self {
      project_path: project_path.to_string_lossy().to_string(),
      created_at: Utc::now(),
      last_full_index: None,
      last_incremental_update: None,
      model_name: model_name.to_string(),
      embedding_dimension,
      total_files: 0,
      total_chunks: 0,
      storage_size_bytes: 0,
      fts_engine_type: fts_engine_type.to_string(),
    }
  }

  pub fn load(path: &Path) -> Result<Option<Self>, FingerprintError> {
    if !path.exists() {
      return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
  }

  /// Atomic write: temp file + rename.
  pub fn save(&self, path: &Path) -> Result<(), FingerprintError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(self)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
  }
}
