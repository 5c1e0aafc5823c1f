//! Docs pipeline: a simpler sibling of the code index for prose.
//!
//! Only markdown and plain-text files pass through here. Chunks come from
//! the markdown/prose splitters, land in a separate vector store
//! (`docs.lancedb`) with separate fingerprints (`docs-fingerprints.json`),
//! and surface their own stats. The code index never sees these stores.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
  chunker::Chunker,
  config::ProjectConfig,
  domain::{compute_content_hash, language::is_doc_file},
  embedding::EmbeddingEngine,
  fingerprint::{FingerprintStore, fingerprint_file},
  index::{INDEX_DIR_NAME, Result},
  policy::IndexingPolicy,
  store::{ChunkRecord, StoredChunk, VectorStore},
};

/// Statistics bag for the docs pipeline.
#[derive(Debug, Default, Clone)]
pub struct DocsStats {
  pub total_docs: usize,
  pub total_chunks: usize,
  pub storage_size_bytes: u64,
}

/// Outcome of a docs indexing pass.
#[derive(Debug, Default)]
pub struct DocsIndexResult {
  pub docs_indexed: usize,
  pub chunks_created: usize,
  pub errors: Vec<String>,
}

pub struct DocsPipeline {
  root: PathBuf,
  policy: IndexingPolicy,
  chunker: Chunker,
  fingerprints: Mutex<FingerprintStore>,
  embedding: Arc<EmbeddingEngine>,
  store: Arc<dyn VectorStore>,
}

impl DocsPipeline {
  /// Open the docs pipeline with its own LanceDB directory.
  pub async fn open(root: PathBuf, config: &ProjectConfig, embedding: Arc<EmbeddingEngine>) -> Result<Self> {
    let index_dir = root.join(INDEX_DIR_NAME);
    let store: Arc<dyn VectorStore> = Arc::new(
      crate::store::lance::LanceStore::open(index_dir.join("docs.lancedb"), embedding.dimensions()).await?,
    );
    Self::with_store(root, config, embedding, store).await
  }

  pub async fn with_store(
    root: PathBuf,
    config: &ProjectConfig,
    embedding: Arc<EmbeddingEngine>,
    store: Arc<dyn VectorStore>,
  ) -> Result<Self> {
    let index_dir = root.join(INDEX_DIR_NAME);
    std::fs::create_dir_all(&index_dir)?;

    Ok(Self {
      policy: IndexingPolicy::new(&root, config)?,
      fingerprints: Mutex::new(FingerprintStore::load(index_dir.join("docs-fingerprints.json"))?),
      root,
      chunker: Chunker::new(),
      embedding,
      store,
    })
  }

  /// All policy-allowed documentation files in the project.
  pub fn scan_docs(&self) -> Vec<(String, PathBuf)> {
    let mut docs = Vec::new();

    let walker = walkdir::WalkDir::new(&self.root)
      .follow_links(false)
      .into_iter()
      .filter_entry(|entry| entry.file_name().to_string_lossy() != INDEX_DIR_NAME);

    for entry in walker.filter_map(|e| e.ok()) {
      if !entry.file_type().is_file() {
        continue;
      }
      let abs = entry.path();
      let Ok(rel) = abs.strip_prefix(&self.root) else {
        continue;
      };
      let rel_str = rel.to_string_lossy().replace('\\', "/");
      if is_doc_file(&rel_str) && self.policy.should_index(&rel_str, abs).allow {
        docs.push((rel_str, abs.to_path_buf()));
      }
    }

    docs.sort();
    docs
  }

  /// Index every doc whose content hash changed; remove deleted docs.
  pub async fn index_all(&self) -> Result<DocsIndexResult> {
    let docs = self.scan_docs();
    info!(docs = docs.len(), "Docs indexing started");

    let mut result = DocsIndexResult::default();

    // Deleted docs first.
    let known: Vec<String> = self.fingerprints.lock().await.paths().cloned().collect();
    for path in known {
      if !docs.iter().any(|(rel, _)| *rel == path) {
        if let Err(e) = self.remove_doc(&path).await {
          result.errors.push(format!("{path}: {e}"));
        }
      }
    }

    for (rel, abs) in &docs {
      match self.update_doc_inner(rel, abs).await {
        Ok(Some(chunks)) => {
          result.docs_indexed += 1;
          result.chunks_created += chunks;
        }
        Ok(None) => {}
        Err(e) => {
          warn!(doc = rel, error = %e, "Doc failed to index");
          result.errors.push(format!("{rel}: {e}"));
        }
      }
    }

    self.fingerprints.lock().await.persist()?;
    info!(
      docs = result.docs_indexed,
      chunks = result.chunks_created,
      errors = result.errors.len(),
      "Docs indexing complete"
    );
    Ok(result)
  }

  /// Re-index one doc. Returns the chunk count, or None when unchanged.
  pub async fn update_doc(&self, rel_path: &str) -> Result<Option<usize>> {
    let abs = self.root.join(rel_path);
    if !abs.exists() {
      self.remove_doc(rel_path).await?;
      return Ok(None);
    }
    let result = self.update_doc_inner(rel_path, &abs).await?;
    self.fingerprints.lock().await.persist()?;
    Ok(result)
  }

  async fn update_doc_inner(&self, rel: &str, abs: &Path) -> Result<Option<usize>> {
    let text = std::fs::read_to_string(abs)?;
    let hash = compute_content_hash(text.as_bytes());

    {
      let fingerprints = self.fingerprints.lock().await;
      if fingerprints.get(rel).is_some_and(|fp| fp.content_hash == hash) {
        return Ok(None);
      }
    }

    let chunks = self.chunker.chunk_file(rel, &text);
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let batch = self.embedding.embed_batch(&texts, None).await?;

    let mut vectors: std::collections::HashMap<usize, Vec<f32>> = std::collections::HashMap::new();
    for (slot, idx) in batch.succeeded.iter().enumerate() {
      vectors.insert(*idx, batch.vectors[slot].clone());
    }
    let records: Vec<ChunkRecord> = chunks
      .iter()
      .enumerate()
      .map(|(i, chunk)| ChunkRecord::from_chunk(chunk, vectors.remove(&i).unwrap_or_default()))
      .collect();

    self.store.delete_by_path(rel).await?;
    self.store.upsert(&records).await?;

    let mut fingerprints = self.fingerprints.lock().await;
    fingerprints.insert(rel.to_string(), fingerprint_file(abs, hash));
    debug!(doc = rel, chunks = records.len(), "Doc indexed");
    Ok(Some(records.len()))
  }

  pub async fn remove_doc(&self, rel_path: &str) -> Result<()> {
    self.store.delete_by_path(rel_path).await?;
    let mut fingerprints = self.fingerprints.lock().await;
    fingerprints.remove(rel_path);
    fingerprints.persist()?;
    Ok(())
  }

  /// Semantic search over the docs store.
  pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<(StoredChunk, f32)>> {
    let vector = self.embedding.embed(query).await?;
    Ok(self.store.search_by_vector(&vector, top_k, None).await?)
  }

  pub async fn stats(&self) -> Result<DocsStats> {
    Ok(DocsStats {
      total_docs: self.fingerprints.lock().await.len(),
      total_chunks: self.store.count_chunks().await?,
      storage_size_bytes: self.store.storage_size().await?,
    })
  }

  pub async fn doc_count(&self) -> usize {
    self.fingerprints.lock().await.len()
  }
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;
  use crate::embedding::testing::FakeBackend;

  async fn pipeline_in(temp: &TempDir) -> DocsPipeline {
    let embedding = Arc::new(EmbeddingEngine::new(Arc::new(FakeBackend::new(8)), 8192));
    DocsPipeline::open(temp.path().to_path_buf(), &ProjectConfig::default(), embedding)
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn test_scan_only_docs() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("README.md"), "# Readme\n\nhello\n").unwrap();
    std::fs::write(temp.path().join("notes.txt"), "notes\n").unwrap();
    std::fs::write(temp.path().join("main.rs"), "fn main() {}\n").unwrap();

    let pipeline = pipeline_in(&temp).await;
    let docs = pipeline.scan_docs();
    let paths: Vec<&str> = docs.iter().map(|(rel, _)| rel.as_str()).collect();
    assert_eq!(paths, vec!["README.md", "notes.txt"]);
  }

  #[tokio::test]
  async fn test_index_and_search() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
      temp.path().join("guide.md"),
      "# Install Guide\n\nRun the installer and follow the prompts.\n",
    )
    .unwrap();

    let pipeline = pipeline_in(&temp).await;
    let result = pipeline.index_all().await.unwrap();
    assert_eq!(result.docs_indexed, 1);
    assert!(result.chunks_created >= 1);
    assert!(result.errors.is_empty());

    let hits = pipeline.search("install guide", 5).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].0.path, "guide.md");
  }

  #[tokio::test]
  async fn test_unchanged_doc_skipped() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("a.md"), "# A\n\ntext\n").unwrap();

    let pipeline = pipeline_in(&temp).await;
    pipeline.index_all().await.unwrap();

    let second = pipeline.index_all().await.unwrap();
    assert_eq!(second.docs_indexed, 0, "unchanged docs are skipped");
  }

  #[tokio::test]
  async fn test_deleted_doc_removed() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("gone.md"), "# Gone\n\ntext\n").unwrap();

    let pipeline = pipeline_in(&temp).await;
    pipeline.index_all().await.unwrap();
    assert_eq!(pipeline.doc_count().await, 1);

    std::fs::remove_file(temp.path().join("gone.md")).unwrap();
    pipeline.index_all().await.unwrap();
    assert_eq!(pipeline.doc_count().await, 0);

    let stats = pipeline.stats().await.unwrap();
    assert_eq!(stats.total_chunks, 0);
  }

  #[tokio::test]
  async fn test_separate_fingerprint_file() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("a.md"), "# A\n\ntext\n").unwrap();

    let pipeline = pipeline_in(&temp).await;
    pipeline.index_all().await.unwrap();

    assert!(temp.path().join(".quarry/docs-fingerprints.json").exists());
  }
}
