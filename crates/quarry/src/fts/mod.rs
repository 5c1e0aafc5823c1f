//! Lexical (full-text) search engines.
//!
//! Two implementations behind one trait: an in-memory BM25 index for small
//! corpora and a SQLite FTS5 engine for large ones. The factory picks one
//! from the configured preference and corpus size, probing native
//! availability at selection time and recording the reason whenever it has
//! to fall back.

pub mod memory;
#[cfg(feature = "native-fts")]
pub mod native;

use std::path::Path;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub use memory::MemoryFtsEngine;

use crate::{config::FtsEnginePreference, domain::Chunk};

/// Corpora at or below this file count stay on the in-memory engine under
/// `auto` selection.
pub const AUTO_NATIVE_THRESHOLD: usize = 5000;

#[derive(Error, Debug)]
pub enum FtsError {
  #[error("FTS engine not initialized")]
  NotInitialized,
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
  #[cfg(feature = "native-fts")]
  #[error("SQLite error: {0}")]
  Sqlite(#[from] rusqlite::Error),
  #[error("FTS backend error: {0}")]
  Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtsEngineType {
  Memory,
  Native,
}

impl FtsEngineType {
  pub fn as_str(&self) -> &'static str {
    match self {
      FtsEngineType::Memory => "memory",
      FtsEngineType::Native => "native",
    }
  }
}

/// One lexical search result.
#[derive(Debug, Clone)]
pub struct FtsHit {
  pub id: Uuid,
  pub path: String,
  pub text: String,
  pub start_line: u32,
  pub end_line: u32,
  pub score: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FtsStats {
  pub documents: usize,
  /// Distinct terms; 0 when the engine does not track them.
  pub terms: usize,
}

/// The lexical engine contract the pipeline depends on.
pub trait FtsEngine: Send {
  fn engine_type(&self) -> FtsEngineType;
  fn add_chunk(&mut self, chunk: &Chunk) -> Result<(), FtsError>;
  fn add_chunks(&mut self, chunks: &[Chunk]) -> Result<(), FtsError>;
  fn search(&self, query: &str, top_k: usize) -> Result<Vec<FtsHit>, FtsError>;
  fn remove_by_path(&mut self, path: &str) -> Result<(), FtsError>;
  /// Rescale scores in place so the best hit is 1.0.
  fn normalize_scores(&self, hits: &mut [FtsHit]);
  fn has_data(&self) -> bool;
  fn stats(&self) -> FtsStats;
  fn serialize(&self) -> Result<Vec<u8>, FtsError>;
  fn deserialize(&mut self, bytes: &[u8]) -> Result<(), FtsError>;
  fn close(&mut self) -> Result<(), FtsError>;
}

/// A selected engine plus how the selection went.
pub struct FtsSelection {
  pub engine: Box<dyn FtsEngine>,
  pub engine_type: FtsEngineType,
  /// Set when the preferred engine was unavailable.
  pub fallback_reason: Option<String>,
}

/// Pick and construct an FTS engine.
pub fn create_engine(index_dir: &Path, preference: FtsEnginePreference, file_count: usize) -> FtsSelection {
  match preference {
    FtsEnginePreference::Memory => memory_selection(None),
    FtsEnginePreference::Native => native_or_fallback(index_dir),
    FtsEnginePreference::Auto => {
      if file_count <= AUTO_NATIVE_THRESHOLD {
        memory_selection(None)
      } else {
        native_or_fallback(index_dir)
      }
    }
  }
}

fn memory_selection(fallback_reason: Option<String>) -> FtsSelection {
  info!(engine = "memory", reason = ?fallback_reason, "FTS engine selected");
  FtsSelection {
    engine: Box::new(MemoryFtsEngine::new()),
    engine_type: FtsEngineType::Memory,
    fallback_reason,
  }
}

#[cfg(feature = "native-fts")]
fn native_or_fallback(index_dir: &Path) -> FtsSelection {
  if !native::native_available() {
    return memory_selection(Some("native FTS5 unavailable in this environment".to_string()));
  }
  match native::NativeFtsEngine::open(&index_dir.join("fts.sqlite")) {
    Ok(engine) => {
      info!(engine = "native", "FTS engine selected");
      FtsSelection {
        engine: Box::new(engine),
        engine_type: FtsEngineType::Native,
        fallback_reason: None,
      }
    }
    Err(e) => memory_selection(Some(format!("native FTS5 failed to open: {e}"))),
  }
}

#[cfg(not(feature = "native-fts"))]
fn native_or_fallback(_index_dir: &Path) -> FtsSelection {
  memory_selection(Some("native FTS5 not compiled in".to_string()))
}
