//! Project configuration with serde defaults.
//!
//! Loaded from `<project root>/.quarry.toml` when present. A missing file
//! yields the defaults; a file that fails to parse is an error so silent
//! misconfiguration cannot disable the policy layer.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rough chars-per-token estimate used for embedding input budgeting.
pub const CHARS_PER_TOKEN: usize = 4;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Invalid config file: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("Invalid size string '{0}'")]
  InvalidSize(String),
}

/// Which full-text engine the factory should pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FtsEnginePreference {
  /// In-memory engine for small corpora, native above the threshold.
  #[default]
  Auto,
  /// Always the in-memory BM25 engine.
  Memory,
  /// The SQLite FTS5 engine, falling back to memory when unavailable.
  Native,
}

/// Embedding backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
  /// Model name, advisory; recorded in index metadata.
  pub model: String,
  /// Embedding dimension; every returned vector is validated against this.
  pub dimensions: usize,
  /// Base URL of the embedding server (Ollama-compatible `/api/embed`).
  pub base_url: String,
  /// Model context length, used to truncate oversized inputs.
  pub context_length: usize,
}

impl Default for EmbeddingSettings {
  fn default() -> Self {
    Self {
      model: "nomic-embed-text".to_string(),
      dimensions: 768,
      base_url: "http://localhost:11434".to_string(),
      context_length: 8192,
    }
  }
}

/// File watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
  /// Per-path debounce window in milliseconds.
  pub debounce_ms: u64,
  /// How long a file must be stable before an event is considered settled.
  pub stability_threshold_ms: u64,
  /// Poll interval used while waiting for write-finish.
  pub poll_interval_ms: u64,
}

impl Default for WatchSettings {
  fn default() -> Self {
    Self {
      debounce_ms: 500,
      stability_threshold_ms: 500,
      poll_interval_ms: 100,
    }
  }
}

/// Integrity reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegritySettings {
  /// Interval between scheduled reconcile runs, in milliseconds.
  pub interval_ms: u64,
  /// Whether the startup drift check runs at all.
  pub startup_check: bool,
}

impl Default for IntegritySettings {
  fn default() -> Self {
    Self {
      interval_ms: 24 * 60 * 60 * 1000,
      startup_check: true,
    }
  }
}

/// Per-project configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
  /// Include globs; `["**/*"]` means everything.
  pub include: Vec<String>,
  /// Exclude globs, matched before gitignore.
  pub exclude: Vec<String>,
  pub respect_gitignore: bool,
  /// Human size string, e.g. "1MB", "512kb", "2GiB".
  pub max_file_size: String,
  pub fts_engine: FtsEnginePreference,
  pub embedding: EmbeddingSettings,
  pub watch: WatchSettings,
  pub integrity: IntegritySettings,
}

impl Default for ProjectConfig {
  fn default() -> Self {
    Self {
      include: vec!["**/*".to_string()],
      exclude: Vec::new(),
      respect_gitignore: true,
      max_file_size: "1MB".to_string(),
      fts_engine: FtsEnginePreference::Auto,
      embedding: EmbeddingSettings::default(),
      watch: WatchSettings::default(),
      integrity: IntegritySettings::default(),
    }
  }
}

impl ProjectConfig {
  /// Load config from `<root>/.quarry.toml`, defaulting when absent.
  pub fn load(root: &Path) -> Result<Self, ConfigError> {
    let path = root.join(".quarry.toml");
    if !path.exists() {
      return Ok(Self::default());
    }
    let raw = std::fs::read_to_string(&path)?;
    Ok(toml::from_str(&raw)?)
  }

  /// Parsed byte limit from `max_file_size`.
  pub fn max_file_size_bytes(&self) -> Result<u64, ConfigError> {
    parse_size(&self.max_file_size)
  }
}

/// Parse a human-readable size ("1MB", "512 KiB", "2048") into bytes.
///
/// Decimal (KB/MB/GB) and binary (KiB/MiB/GiB) suffixes are both accepted;
/// matching is case-insensitive and an optional space before the suffix is
/// tolerated.
pub fn parse_size(input: &str) -> Result<u64, ConfigError> {
  let s = input.trim();
  let split = s
    .find(|c: char| !c.is_ascii_digit() && c != '.')
    .unwrap_or(s.len());
  let (num_part, suffix) = s.split_at(split);
  let value: f64 = num_part
    .trim()
    .parse()
    .map_err(|_| ConfigError::InvalidSize(input.to_string()))?;

  let multiplier: u64 = match suffix.trim().to_lowercase().as_str() {
    "" | "b" => 1,
    "kb" => 1000,
    "mb" => 1000 * 1000,
    "gb" => 1000 * 1000 * 1000,
    "kib" | "k" => 1024,
    "mib" | "m" => 1024 * 1024,
    "gib" | "g" => 1024 * 1024 * 1024,
    _ => return Err(ConfigError::InvalidSize(input.to_string())),
  };

  if value < 0.0 {
    return Err(ConfigError::InvalidSize(input.to_string()));
  }

  Ok((value * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_size_variants() {
    assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
    assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
    assert_eq!(parse_size("512kb").unwrap(), 512_000);
    assert_eq!(parse_size("2048").unwrap(), 2048);
    assert_eq!(parse_size("1.5 KB").unwrap(), 1500);
    assert!(parse_size("lots").is_err());
    assert!(parse_size("10parsecs").is_err());
  }

  #[test]
  fn test_default_config() {
    let config = ProjectConfig::default();
    assert_eq!(config.include, vec!["**/*"]);
    assert!(config.respect_gitignore);
    assert_eq!(config.max_file_size_bytes().unwrap(), 1_000_000);
    assert_eq!(config.fts_engine, FtsEnginePreference::Auto);
  }

  #[test]
  fn test_load_missing_file_defaults() {
    let temp = tempfile::TempDir::new().unwrap();
    let config = ProjectConfig::load(temp.path()).unwrap();
    assert_eq!(config.embedding.dimensions, 768);
  }

  #[test]
  fn test_load_partial_toml() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::write(
      temp.path().join(".quarry.toml"),
      "max_file_size = \"2MB\"\nexclude = [\"generated/**\"]\n",
    )
    .unwrap();

    let config = ProjectConfig::load(temp.path()).unwrap();
    assert_eq!(config.max_file_size_bytes().unwrap(), 2_000_000);
    assert_eq!(config.exclude, vec!["generated/**"]);
    // Untouched sections keep defaults
    assert!(config.respect_gitignore);
  }

  #[test]
  fn test_load_invalid_toml_errors() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::write(temp.path().join(".quarry.toml"), "include = 7\n").unwrap();
    assert!(ProjectConfig::load(temp.path()).is_err());
  }
}
