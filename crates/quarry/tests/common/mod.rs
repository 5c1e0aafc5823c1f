//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use quarry::{
  ProjectConfig,
  embedding::{EmbeddingBackend, EmbeddingEngine, EmbeddingError},
  index::IndexManager,
};
use tempfile::TempDir;

/// Deterministic in-process embedding backend.
///
/// Vectors are derived from an FNV-style hash of the text, so identical
/// inputs embed identically and no network is involved. Counters expose
/// how many texts were actually embedded.
pub struct CountingBackend {
  dimensions: usize,
  pub embedded_texts: AtomicUsize,
  pub batch_calls: AtomicUsize,
}

impl CountingBackend {
  pub fn new(dimensions: usize) -> Self {
    Self {
      dimensions,
      embedded_texts: AtomicUsize::new(0),
      batch_calls: AtomicUsize::new(0),
    }
  }

  pub fn texts_embedded(&self) -> usize {
    self.embedded_texts.load(Ordering::SeqCst)
  }

  fn vector_for(&self, text: &str) -> Vec<f32> {
    let mut seed: u32 = 2166136261;
    for b in text.bytes() {
      seed ^= b as u32;
      seed = seed.wrapping_mul(16777619);
    }
    (0..self.dimensions)
      .map(|i| {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        ((seed >> 8) as f32 / u32::MAX as f32) + i as f32 * 1e-6
      })
      .collect()
  }
}

#[async_trait]
impl EmbeddingBackend for CountingBackend {
  fn name(&self) -> &str {
    "counting"
  }

  fn model_id(&self) -> &str {
    "counting-embedder"
  }

  fn dimensions(&self) -> usize {
    self.dimensions
  }

  async fn load(&self) -> Result<(), EmbeddingError> {
    Ok(())
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    self.batch_calls.fetch_add(1, Ordering::SeqCst);
    self.embedded_texts.fetch_add(texts.len(), Ordering::SeqCst);
    Ok(texts.iter().map(|t| self.vector_for(t)).collect())
  }
}

pub const TEST_DIM: usize = 8;

/// A manager over a temp project with the counting backend.
pub async fn open_manager(temp: &TempDir) -> (Arc<CountingBackend>, Arc<IndexManager>) {
  open_manager_with_config(temp, ProjectConfig::default()).await
}

pub async fn open_manager_with_config(
  temp: &TempDir,
  config: ProjectConfig,
) -> (Arc<CountingBackend>, Arc<IndexManager>) {
  let backend = Arc::new(CountingBackend::new(TEST_DIM));
  let engine = Arc::new(EmbeddingEngine::new(backend.clone(), 8192));
  let manager = IndexManager::open(temp.path().to_path_buf(), config, engine)
    .await
    .expect("manager opens");
  (backend, Arc::new(manager))
}

/// Write a file, creating parent directories.
pub fn write_file(temp: &TempDir, rel: &str, content: &str) {
  let path = temp.path().join(rel);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
}

/// Write raw bytes, creating parent directories.
pub fn write_bytes(temp: &TempDir, rel: &str, content: &[u8]) {
  let path = temp.path().join(rel);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
}
