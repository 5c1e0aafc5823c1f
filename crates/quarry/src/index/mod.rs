//! Index orchestration: scan, chunk, diff, embed, store.
//!
//! The manager owns the policy, chunker, fingerprints, FTS engine and
//! vector store, and serializes all mutation per path. Write order for a
//! file is always store -> FTS -> fingerprint, so a failure before the
//! fingerprint write leaves the file marked dirty and the next integrity
//! pass re-examines it.

pub mod metadata;

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::{
    Arc, RwLock,
    atomic::{AtomicBool, Ordering},
  },
};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use self::metadata::IndexMetadata;
use crate::{
  chunker::Chunker,
  config::ProjectConfig,
  diff::{diff_chunks, should_use_incremental},
  domain::{Chunk, compute_content_hash},
  embedding::EmbeddingEngine,
  fingerprint::{FileDelta, FingerprintStore, fingerprint_file},
  fts::{FtsEngine, FtsEngineType, create_engine},
  policy::IndexingPolicy,
  store::{ChunkRecord, SpanUpdate, VectorStore},
};

/// Whether the manager created its own LanceDB store or was handed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreKind {
  Owned,
  External,
}

/// Directory under the project root holding all persisted index state.
pub const INDEX_DIR_NAME: &str = ".quarry";

/// Files are processed in batches of this size to bound memory.
const FILE_BATCH_SIZE: usize = 50;

#[derive(Error, Debug)]
pub enum IndexError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Policy error: {0}")]
  Policy(#[from] crate::policy::PolicyError),
  #[error("Fingerprint error: {0}")]
  Fingerprint(#[from] crate::fingerprint::FingerprintError),
  #[error("Embedding error: {0}")]
  Embedding(#[from] crate::embedding::EmbeddingError),
  #[error("FTS error: {0}")]
  Fts(#[from] crate::fts::FtsError),
  #[error("Vector store error: {0}")]
  Store(#[from] crate::store::StoreError),
  #[error("Indexing is already in progress")]
  AlreadyIndexing,
}

pub type Result<T> = std::result::Result<T, IndexError>;

// ============================================================================
// Progress reporting
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
  Scanning,
  Chunking,
  Embedding,
  Storing,
  Finalizing,
  Adding,
  Modifying,
  Removing,
}

#[derive(Debug, Clone)]
pub struct Progress {
  pub phase: ProgressPhase,
  pub current: usize,
  pub total: usize,
  pub current_file: Option<String>,
}

pub type ProgressCallback<'a> = &'a (dyn Fn(Progress) + Send + Sync);

fn report(progress: Option<ProgressCallback<'_>>, phase: ProgressPhase, current: usize, total: usize, file: Option<&str>) {
  if let Some(cb) = progress {
    cb(Progress {
      phase,
      current,
      total,
      current_file: file.map(str::to_string),
    });
  }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of a full index or rebuild.
#[derive(Debug, Default)]
pub struct IndexResult {
  pub files_indexed: usize,
  pub chunks_created: usize,
  pub embedding_failures: usize,
  /// Per-file errors; the run as a whole still succeeded.
  pub errors: Vec<String>,
}

/// Outcome of a single-file update.
#[derive(Debug, PartialEq, Eq)]
pub enum FileUpdate {
  Updated {
    added: usize,
    moved: usize,
    removed: usize,
    unchanged: usize,
  },
  Removed,
  Skipped { reason: String },
}

/// Outcome of applying a file delta.
#[derive(Debug, Default)]
pub struct DeltaOutcome {
  pub success: bool,
  pub applied: usize,
  pub errors: Vec<String>,
}

// ============================================================================
// IndexManager
// ============================================================================

/// RAII guard for the mutual-exclusion flag shared with the integrity
/// engine.
struct ActiveGuard(Arc<AtomicBool>);

impl ActiveGuard {
  fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
    if flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
      return Err(IndexError::AlreadyIndexing);
    }
    Ok(Self(flag.clone()))
  }
}

impl Drop for ActiveGuard {
  fn drop(&mut self) {
    self.0.store(false, Ordering::SeqCst);
  }
}

pub struct IndexManager {
  root: PathBuf,
  index_dir: PathBuf,
  config: ProjectConfig,
  policy: RwLock<IndexingPolicy>,
  chunker: Chunker,
  fingerprints: Mutex<FingerprintStore>,
  embedding: Arc<EmbeddingEngine>,
  fts: Mutex<Box<dyn FtsEngine>>,
  fts_engine_type: FtsEngineType,
  store: tokio::sync::RwLock<Arc<dyn VectorStore>>,
  store_kind: StoreKind,
  indexing_active: Arc<AtomicBool>,
  /// Per-path serialization: two updates for one path never run
  /// concurrently.
  path_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IndexManager {
  /// Open a manager with the default LanceDB store under `<root>/.quarry`.
  pub async fn open(root: PathBuf, config: ProjectConfig, embedding: Arc<EmbeddingEngine>) -> Result<Self> {
    let index_dir = root.join(INDEX_DIR_NAME);
    let dim = embedding.dimensions();
    let store: Arc<dyn VectorStore> =
      Arc::new(crate::store::lance::LanceStore::open(index_dir.join("lancedb"), dim).await?);
    Self::build(root, config, embedding, store, StoreKind::Owned).await
  }

  /// Open with an externally supplied vector store (tests, embedders).
  pub async fn with_store(
    root: PathBuf,
    config: ProjectConfig,
    embedding: Arc<EmbeddingEngine>,
    store: Arc<dyn VectorStore>,
  ) -> Result<Self> {
    Self::build(root, config, embedding, store, StoreKind::External).await
  }

  async fn build(
    root: PathBuf,
    config: ProjectConfig,
    embedding: Arc<EmbeddingEngine>,
    store: Arc<dyn VectorStore>,
    store_kind: StoreKind,
  ) -> Result<Self> {
    let index_dir = root.join(INDEX_DIR_NAME);
    std::fs::create_dir_all(&index_dir)?;

    let policy = IndexingPolicy::new(&root, &config)?;
    let fingerprints = FingerprintStore::load(index_dir.join("fingerprints.json"))?;
    let mut selection = create_engine(&index_dir, config.fts_engine, fingerprints.len());
    if let Some(ref reason) = selection.fallback_reason {
      warn!(reason, "FTS engine fell back");
    }

    // The in-memory engine does not survive a restart; rebuild its
    // postings from the stored chunk text.
    if !fingerprints.is_empty() && !selection.engine.has_data() {
      let mut rehydrated = 0usize;
      for path in store.indexed_paths().await? {
        for existing in store.get_by_path(&path).await? {
          selection.engine.add_chunk(&existing_to_chunk(existing, &path))?;
          rehydrated += 1;
        }
      }
      debug!(chunks = rehydrated, "FTS postings rehydrated from the vector store");
    }

    Ok(Self {
      root,
      index_dir,
      config,
      policy: RwLock::new(policy),
      chunker: Chunker::new(),
      fingerprints: Mutex::new(fingerprints),
      embedding,
      fts_engine_type: selection.engine_type,
      fts: Mutex::new(selection.engine),
      store: tokio::sync::RwLock::new(store),
      store_kind,
      indexing_active: Arc::new(AtomicBool::new(false)),
      path_locks: DashMap::new(),
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn index_dir(&self) -> &Path {
    &self.index_dir
  }

  pub fn config(&self) -> &ProjectConfig {
    &self.config
  }

  pub fn embedding(&self) -> Arc<EmbeddingEngine> {
    self.embedding.clone()
  }

  /// Shared flag checked by the integrity engine before reconciling.
  pub fn indexing_active_flag(&self) -> Arc<AtomicBool> {
    self.indexing_active.clone()
  }

  pub fn set_indexing_active(&self, active: bool) {
    self.indexing_active.store(active, Ordering::SeqCst);
  }

  pub async fn store(&self) -> Arc<dyn VectorStore> {
    self.store.read().await.clone()
  }

  /// Current fingerprint for a path, if any.
  pub async fn fingerprint_of(&self, rel_path: &str) -> Option<crate::fingerprint::FileFingerprint> {
    self.fingerprints.lock().await.get(rel_path).cloned()
  }

  pub async fn fingerprint_count(&self) -> usize {
    self.fingerprints.lock().await.len()
  }

  /// Policy check through the manager's (reloadable) policy.
  pub fn should_index(&self, rel_path: &str, abs_path: &Path) -> crate::policy::PolicyDecision {
    self.policy.read().expect("policy lock poisoned").should_index(rel_path, abs_path)
  }

  /// Re-read gitignore state after a `.gitignore` change.
  pub fn reload_policy(&self) -> Result<()> {
    self.policy.write().expect("policy lock poisoned").reload_gitignore()?;
    Ok(())
  }

  // ==========================================================================
  // Scanning
  // ==========================================================================

  /// Walk the project and return `(rel_path, abs_path)` for every file the
  /// policy allows.
  pub fn scan_files(&self) -> Vec<(String, PathBuf)> {
    let policy = self.policy.read().expect("policy lock poisoned");
    let mut files = Vec::new();

    let walker = walkdir::WalkDir::new(&self.root)
      .follow_links(false)
      .into_iter()
      .filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        // The index's own state never gets indexed.
        name != INDEX_DIR_NAME
      });

    for entry in walker.filter_map(|e| e.ok()) {
      if !entry.file_type().is_file() {
        continue;
      }
      let abs = entry.path();
      let Ok(rel) = abs.strip_prefix(&self.root) else {
        continue;
      };
      let rel_str = rel.to_string_lossy().replace('\\', "/");
      if policy.should_index(&rel_str, abs).allow {
        files.push((rel_str, abs.to_path_buf()));
      }
    }

    files.sort();
    files
  }

  /// File-level delta between a scan and the persisted fingerprints.
  pub async fn compute_delta(&self, scan: &HashMap<String, String>) -> FileDelta {
    self.fingerprints.lock().await.delta(scan)
  }

  /// Structured symbol summary for one file (symbols, imports, exports,
  /// complexity). `None` when no grammar covers the language.
  #[cfg(feature = "ast")]
  pub fn file_summary(&self, rel_path: &str) -> Result<Option<crate::chunker::symbols::FileSummary>> {
    let abs = self.root.join(rel_path);
    let text = std::fs::read_to_string(&abs)?;
    Ok(
      crate::domain::Language::from_path(rel_path)
        .and_then(|language| crate::chunker::symbols::extract_summary(&text, language)),
    )
  }

  /// Scan and hash every indexable file (used by the integrity engine).
  pub fn scan_current_state(&self) -> HashMap<String, String> {
    let mut state = HashMap::new();
    for (rel, abs) in self.scan_files() {
      if let Ok(bytes) = std::fs::read(&abs) {
        state.insert(rel, compute_content_hash(&bytes));
      }
    }
    state
  }

  // ==========================================================================
  // Full indexing
  // ==========================================================================

  /// Full scan, chunk, embed and store. Replaces any previous content for
  /// the scanned files.
  pub async fn create_index(&self, progress: Option<ProgressCallback<'_>>) -> Result<IndexResult> {
    let _guard = ActiveGuard::acquire(&self.indexing_active)?;
    self.reload_policy()?;

    report(progress, ProgressPhase::Scanning, 0, 0, None);
    let files = self.scan_files();
    let total = files.len();
    info!(files = total, "Full index started");

    let mut result = IndexResult::default();
    let store = self.store().await;

    for (batch_no, batch) in files.chunks(FILE_BATCH_SIZE).enumerate() {
      for (offset, (rel, abs)) in batch.iter().enumerate() {
        let position = batch_no * FILE_BATCH_SIZE + offset + 1;
        match self.index_one_file(&store, rel, abs, position, total, progress).await {
          Ok((chunk_count, failures)) => {
            result.files_indexed += 1;
            result.chunks_created += chunk_count;
            result.embedding_failures += failures;
          }
          Err(e) => {
            warn!(file = rel, error = %e, "File failed to index");
            result.errors.push(format!("{rel}: {e}"));
          }
        }
      }
      // Yield between batches; a large project must not starve the runtime.
      tokio::task::yield_now().await;
    }

    // Evict anything indexed previously that the scan no longer sees
    // (deleted files, newly denied paths).
    let scanned: std::collections::HashSet<&str> = files.iter().map(|(rel, _)| rel.as_str()).collect();
    let stale: Vec<String> = {
      let fingerprints = self.fingerprints.lock().await;
      fingerprints.paths().filter(|p| !scanned.contains(p.as_str())).cloned().collect()
    };
    for path in stale {
      if let Err(e) = self.remove_file(&path).await {
        result.errors.push(format!("{path}: {e}"));
      }
    }

    report(progress, ProgressPhase::Finalizing, total, total, None);
    self.finalize(&store, true).await?;

    info!(
      files = result.files_indexed,
      chunks = result.chunks_created,
      errors = result.errors.len(),
      "Full index complete"
    );
    Ok(result)
  }

  async fn index_one_file(
    &self,
    store: &Arc<dyn VectorStore>,
    rel: &str,
    abs: &Path,
    position: usize,
    total: usize,
    progress: Option<ProgressCallback<'_>>,
  ) -> Result<(usize, usize)> {
    report(progress, ProgressPhase::Chunking, position, total, Some(rel));
    let text = std::fs::read_to_string(abs)?;
    let chunks = self.chunker.chunk_file(rel, &text);
    if chunks.is_empty() {
      return Ok((0, 0));
    }
    let total_chunks = chunks.len();
    let content_hash = chunks[0].content_hash.clone();

    report(progress, ProgressPhase::Embedding, position, total, Some(rel));
    let (_update, failures) = self.reindex_file(store, rel, &content_hash, chunks).await?;
    report(progress, ProgressPhase::Storing, position, total, Some(rel));

    {
      let mut fingerprints = self.fingerprints.lock().await;
      fingerprints.insert(rel.to_string(), fingerprint_file(abs, content_hash));
    }

    if failures > 0 {
      debug!(file = rel, failures, "Some chunks stored without embeddings");
    }

    Ok((total_chunks, failures))
  }

  /// Embed chunks and pair them with their vectors. Chunks whose embedding
  /// failed become partial records (empty vector) rather than being
  /// dropped; lexical search still covers them.
  async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<(Vec<ChunkRecord>, usize)> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let batch = self.embedding.embed_batch(&texts, None).await?;

    let mut vectors: HashMap<usize, Vec<f32>> = HashMap::new();
    for (slot, input_idx) in batch.succeeded.iter().enumerate() {
      vectors.insert(*input_idx, batch.vectors[slot].clone());
    }

    let records = chunks
      .iter()
      .enumerate()
      .map(|(i, chunk)| ChunkRecord::from_chunk(chunk, vectors.remove(&i).unwrap_or_default()))
      .collect();

    Ok((records, batch.failed_count))
  }

  /// Write one file's chunks, diffing against whatever the store already
  /// holds so unchanged and moved chunks keep their ids and vectors and
  /// only genuinely new chunks are embedded.
  async fn reindex_file(
    &self,
    store: &Arc<dyn VectorStore>,
    rel_path: &str,
    content_hash: &str,
    new_chunks: Vec<Chunk>,
  ) -> Result<(FileUpdate, usize)> {
    let existing = store.get_by_path(rel_path).await?;

    if existing.is_empty() {
      let added = new_chunks.len();
      let (records, failures) = self.embed_chunks(&new_chunks).await?;
      store.upsert(&records).await?;
      {
        let mut fts = self.fts.lock().await;
        fts.remove_by_path(rel_path)?;
        fts.add_chunks(&new_chunks)?;
      }
      return Ok((
        FileUpdate::Updated {
          added,
          moved: 0,
          removed: 0,
          unchanged: 0,
        },
        failures,
      ));
    }

    let diff = diff_chunks(existing, new_chunks);
    debug!(
      file = rel_path,
      unchanged = diff.unchanged.len(),
      moved = diff.moved.len(),
      added = diff.added.len(),
      removed = diff.removed.len(),
      "Diffed reindex"
    );

    // Only added chunks are embedded; everything matched keeps its vector.
    let (added_records, failures) = self.embed_chunks(&diff.added).await?;

    // Final chunk set with preserved ids, for FTS and small rewrites.
    let mut final_chunks: Vec<Chunk> = Vec::with_capacity(diff.total_new());
    for matched in diff.unchanged.iter().chain(diff.moved.iter()) {
      let mut chunk = matched.incoming.clone();
      chunk.id = matched.existing.id;
      final_chunks.push(chunk);
    }
    final_chunks.extend(diff.added.iter().cloned());

    if should_use_incremental(diff.total_new()) {
      // Targeted writes: upsert new, rewrite spans, delete gone.
      store.upsert(&added_records).await?;

      let mut span_updates: Vec<SpanUpdate> = Vec::with_capacity(diff.moved.len() + diff.unchanged.len());
      for matched in &diff.moved {
        span_updates.push(SpanUpdate {
          id: matched.existing.id,
          path: rel_path.to_string(),
          start_line: matched.incoming.start_line,
          end_line: matched.incoming.end_line,
          content_hash: content_hash.to_string(),
        });
      }
      // Unchanged chunks keep their span, but the file hash under them may
      // have moved on.
      for matched in &diff.unchanged {
        span_updates.push(SpanUpdate {
          id: matched.existing.id,
          path: rel_path.to_string(),
          start_line: matched.existing.start_line,
          end_line: matched.existing.end_line,
          content_hash: content_hash.to_string(),
        });
      }
      store.update_spans(&span_updates).await?;

      let removed_ids: Vec<Uuid> = diff.removed.iter().map(|c| c.id).collect();
      store.delete_by_ids(&removed_ids).await?;
    } else {
      // Small files: rewrite the whole path, still reusing matched
      // vectors and ids. The final chunk list starts with the matched
      // chunks in diff order, so the zip below lines up.
      let mut records: Vec<ChunkRecord> = diff
        .unchanged
        .iter()
        .chain(diff.moved.iter())
        .zip(final_chunks.iter())
        .map(|(matched, chunk)| ChunkRecord::from_chunk(chunk, matched.existing.vector.clone()))
        .collect();
      records.extend(added_records);

      store.delete_by_path(rel_path).await?;
      store.upsert(&records).await?;
    }

    {
      let mut fts = self.fts.lock().await;
      fts.remove_by_path(rel_path)?;
      fts.add_chunks(&final_chunks)?;
    }

    Ok((
      FileUpdate::Updated {
        added: diff.added.len(),
        moved: diff.moved.len(),
        removed: diff.removed.len(),
        unchanged: diff.unchanged.len(),
      },
      failures,
    ))
  }

  async fn finalize(&self, store: &Arc<dyn VectorStore>, full: bool) -> Result<()> {
    {
      let fingerprints = self.fingerprints.lock().await;
      fingerprints.persist()?;
    }

    let mut metadata = IndexMetadata::load(&self.metadata_path())?.unwrap_or_else(|| {
      IndexMetadata::new(
        &self.root,
        self.embedding.model_id(),
        self.embedding.dimensions(),
        self.fts_engine_type.as_str(),
      )
    });
    let now = chrono::Utc::now();
    if full {
      metadata.last_full_index = Some(now);
    } else {
      metadata.last_incremental_update = Some(now);
    }
    metadata.total_files = self.fingerprints.lock().await.len();
    metadata.total_chunks = store.count_chunks().await.unwrap_or(0);
    metadata.storage_size_bytes = store.storage_size().await.unwrap_or(0);
    metadata.save(&self.metadata_path())?;

    Ok(())
  }

  fn metadata_path(&self) -> PathBuf {
    self.index_dir.join("metadata.json")
  }

  // ==========================================================================
  // Single-file updates
  // ==========================================================================

  fn path_lock(&self, rel: &str) -> Arc<Mutex<()>> {
    self
      .path_locks
      .entry(rel.to_string())
      .or_insert_with(|| Arc::new(Mutex::new(())))
      .clone()
  }

  /// Re-index one file incrementally. Missing files delegate to
  /// `remove_file`; policy-denied files are removed from the index when
  /// present.
  pub async fn update_file(&self, rel_path: &str) -> Result<FileUpdate> {
    let lock = self.path_lock(rel_path);
    let _serialized = lock.lock().await;

    let abs = self.root.join(rel_path);
    if !abs.exists() {
      return self.remove_file_locked(rel_path).await;
    }

    let decision = self.should_index(rel_path, &abs);
    if !decision.allow {
      // Policy may have tightened since this file was indexed.
      if self.fingerprints.lock().await.has(rel_path) {
        return self.remove_file_locked(rel_path).await;
      }
      return Ok(FileUpdate::Skipped {
        reason: format!("denied by policy ({:?})", decision.category),
      });
    }

    let text = std::fs::read_to_string(&abs)?;
    let new_chunks = self.chunker.chunk_file(rel_path, &text);
    let content_hash = compute_content_hash(text.as_bytes());

    let store = self.store().await;
    let (outcome, _failures) = self.reindex_file(&store, rel_path, &content_hash, new_chunks).await?;

    // Fingerprint last: a crash above leaves the file dirty for the next
    // integrity pass.
    {
      let mut fingerprints = self.fingerprints.lock().await;
      fingerprints.insert(rel_path.to_string(), fingerprint_file(&abs, content_hash));
      fingerprints.persist()?;
    }

    self.finalize(&store, false).await?;

    Ok(outcome)
  }

  /// Remove a file from every store.
  pub async fn remove_file(&self, rel_path: &str) -> Result<FileUpdate> {
    let lock = self.path_lock(rel_path);
    let _serialized = lock.lock().await;
    self.remove_file_locked(rel_path).await
  }

  async fn remove_file_locked(&self, rel_path: &str) -> Result<FileUpdate> {
    debug!(file = rel_path, "Removing file from index");
    let store = self.store().await;
    store.delete_by_path(rel_path).await?;
    {
      let mut fts = self.fts.lock().await;
      fts.remove_by_path(rel_path)?;
    }
    {
      let mut fingerprints = self.fingerprints.lock().await;
      fingerprints.remove(rel_path);
      fingerprints.persist()?;
    }
    Ok(FileUpdate::Removed)
  }

  // ==========================================================================
  // Delta application
  // ==========================================================================

  /// Apply a file-level delta in batch (integrity reconcile, startup scan).
  pub async fn apply_delta(&self, delta: &FileDelta, progress: Option<ProgressCallback<'_>>) -> DeltaOutcome {
    let mut outcome = DeltaOutcome {
      success: true,
      ..Default::default()
    };
    let total = delta.change_count();
    let mut position = 0usize;

    for path in &delta.removed {
      position += 1;
      report(progress, ProgressPhase::Removing, position, total, Some(path));
      if let Err(e) = self.remove_file(path).await {
        outcome.success = false;
        outcome.errors.push(format!("{path}: {e}"));
      } else {
        outcome.applied += 1;
      }
    }

    for (phase, paths) in [
      (ProgressPhase::Adding, &delta.added),
      (ProgressPhase::Modifying, &delta.modified),
    ] {
      for path in paths {
        position += 1;
        report(progress, phase, position, total, Some(path));
        match self.update_file(path).await {
          Ok(_) => outcome.applied += 1,
          Err(e) => {
            outcome.success = false;
            outcome.errors.push(format!("{path}: {e}"));
          }
        }
      }
    }

    outcome
  }

  // ==========================================================================
  // Lifecycle
  // ==========================================================================

  /// Whether an index exists on disk for this project.
  pub fn is_indexed(&self) -> bool {
    self.metadata_path().exists()
  }

  /// Delete all index state and start empty.
  pub async fn delete_index(&self) -> Result<()> {
    let _guard = ActiveGuard::acquire(&self.indexing_active)?;
    info!(dir = %self.index_dir.display(), "Deleting index");

    {
      let store = self.store().await;
      store.close().await?;
    }
    {
      let mut fts = self.fts.lock().await;
      fts.close()?;
    }

    if self.index_dir.exists() {
      std::fs::remove_dir_all(&self.index_dir)?;
    }
    std::fs::create_dir_all(&self.index_dir)?;

    {
      let mut fingerprints = self.fingerprints.lock().await;
      fingerprints.clear();
    }

    // Reopen an empty store and FTS engine.
    if self.store_kind == StoreKind::Owned {
      let fresh: Arc<dyn VectorStore> = Arc::new(
        crate::store::lance::LanceStore::open(self.index_dir.join("lancedb"), self.embedding.dimensions()).await?,
      );
      *self.store.write().await = fresh;
    }
    let selection = create_engine(&self.index_dir, self.config.fts_engine, 0);
    *self.fts.lock().await = selection.engine;

    Ok(())
  }

  /// Rebuild from scratch: drop the old state, then a full index.
  ///
  /// The fingerprint and metadata files are replaced atomically at
  /// finalize; a crash mid-rebuild is healed by the startup integrity
  /// check, which sees missing fingerprints and re-indexes.
  pub async fn rebuild_index(&self, progress: Option<ProgressCallback<'_>>) -> Result<IndexResult> {
    self.delete_index().await?;
    self.create_index(progress).await
  }

  /// Summary statistics for diagnostics.
  pub async fn get_stats(&self) -> Result<IndexStats> {
    let store = self.store().await;
    let fts = self.fts.lock().await;
    Ok(IndexStats {
      total_files: self.fingerprints.lock().await.len(),
      total_chunks: store.count_chunks().await?,
      storage_size_bytes: store.storage_size().await?,
      fts_documents: fts.stats().documents,
      fts_engine: fts.engine_type(),
    })
  }

  /// Lexical search through the owned FTS engine, scores normalized.
  pub async fn fts_search(&self, query: &str, top_k: usize) -> Result<Vec<crate::fts::FtsHit>> {
    let fts = self.fts.lock().await;
    let mut hits = fts.search(query, top_k)?;
    fts.normalize_scores(&mut hits);
    Ok(hits)
  }
}

/// Minimal chunk view over a stored row, for FTS rehydration.
fn existing_to_chunk(existing: crate::domain::ExistingChunk, path: &str) -> Chunk {
  Chunk {
    id: existing.id,
    path: path.to_string(),
    text: existing.text,
    start_line: existing.start_line,
    end_line: existing.end_line,
    content_hash: String::new(),
    chunk_hash: existing.chunk_hash,
    metadata: None,
  }
}

#[derive(Debug)]
pub struct IndexStats {
  pub total_files: usize,
  pub total_chunks: usize,
  pub storage_size_bytes: u64,
  pub fts_documents: usize,
  pub fts_engine: FtsEngineType,
}
