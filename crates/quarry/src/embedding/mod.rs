//! Embedding engine: deterministic vectorization with partial failure.
//!
//! The engine wraps a pluggable backend and enforces the contract the
//! pipeline relies on:
//! - `initialize` is idempotent and single-flight; concurrent callers
//!   share one load
//! - every vector is validated against the configured dimension and
//!   L2-normalized
//! - batch embedding skips failed inputs (never writes placeholder
//!   vectors) and reports which indices succeeded
//!
//! The model itself is external; `HttpBackend` talks to a local embedding
//! server and tests plug in a deterministic in-process backend.

pub mod device;
pub mod http;
pub mod validation;

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub use self::{
  device::{Device, DeviceDecision, DeviceDetector},
  http::HttpBackend,
};
use self::validation::{InputBudget, clamp_input};

/// Fixed number of texts sent to the backend per call.
pub const EMBED_BATCH_SIZE: usize = 32;

#[derive(Error, Debug)]
pub enum EmbeddingError {
  #[error("Model load failed: {0}")]
  ModelLoadFailed(String),
  #[error("Dimension mismatch: expected {expected}, got {got}")]
  DimensionMismatch { expected: usize, got: usize },
  #[error("Request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("Backend error: {0}")]
  Backend(String),
}

/// A model capable of producing embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
  fn name(&self) -> &str;
  fn model_id(&self) -> &str;
  fn dimensions(&self) -> usize;

  /// Load or warm the model. Called once via the engine's single-flight
  /// initialization.
  async fn load(&self) -> Result<(), EmbeddingError>;

  /// Embed a batch, one vector per input in order.
  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Result of a batch embed with partial failure.
#[derive(Debug, Default)]
pub struct BatchEmbeddings {
  /// Vectors for the successful inputs, in `succeeded` order.
  pub vectors: Vec<Vec<f32>>,
  /// Indices into the input slice that produced a vector.
  pub succeeded: Vec<usize>,
  pub failed_count: usize,
}

impl BatchEmbeddings {
  pub fn is_complete(&self) -> bool {
    self.failed_count == 0
  }
}

/// Progress callback: `(completed, total)`.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// The embedding engine.
pub struct EmbeddingEngine {
  backend: Arc<dyn EmbeddingBackend>,
  init: OnceCell<()>,
  budget: InputBudget,
}

impl EmbeddingEngine {
  pub fn new(backend: Arc<dyn EmbeddingBackend>, context_length: usize) -> Self {
    Self {
      backend,
      init: OnceCell::new(),
      budget: InputBudget::for_context_length(context_length),
    }
  }

  pub fn dimensions(&self) -> usize {
    self.backend.dimensions()
  }

  pub fn model_id(&self) -> &str {
    self.backend.model_id()
  }

  /// Idempotent, concurrency-safe model load. All concurrent callers await
  /// the same underlying `load`.
  pub async fn initialize(&self) -> Result<(), EmbeddingError> {
    self
      .init
      .get_or_try_init(|| async {
        debug!(model = self.backend.model_id(), "Initializing embedding backend");
        self.backend.load().await
      })
      .await?;
    Ok(())
  }

  /// Embed one text. Fails on dimension mismatch.
  pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    self.initialize().await?;

    let (clamped, _) = clamp_input(text, &self.budget);
    let mut vectors = self.backend.embed_batch(&[clamped.as_str()]).await?;
    let vector = vectors
      .pop()
      .ok_or_else(|| EmbeddingError::Backend("backend returned no vector".to_string()))?;

    self.validate(&vector)?;
    Ok(l2_normalize(vector))
  }

  /// Embed many texts with partial-failure semantics.
  ///
  /// Inputs are processed in fixed-size batches. When a whole batch fails,
  /// each of its texts is retried individually so one poison input cannot
  /// sink its neighbors. Failed inputs are skipped, never zero-filled.
  pub async fn embed_batch(&self, texts: &[String], progress: Option<ProgressFn<'_>>) -> Result<BatchEmbeddings, EmbeddingError> {
    self.initialize().await?;

    let total = texts.len();
    let mut result = BatchEmbeddings::default();

    for (batch_idx, batch) in texts.chunks(EMBED_BATCH_SIZE).enumerate() {
      let base = batch_idx * EMBED_BATCH_SIZE;
      let clamped: Vec<String> = batch.iter().map(|t| clamp_input(t, &self.budget).0).collect();
      let refs: Vec<&str> = clamped.iter().map(|s| s.as_str()).collect();

      match self.backend.embed_batch(&refs).await {
        Ok(vectors) if vectors.len() == batch.len() => {
          for (offset, vector) in vectors.into_iter().enumerate() {
            match self.validate(&vector) {
              Ok(()) => {
                result.vectors.push(l2_normalize(vector));
                result.succeeded.push(base + offset);
              }
              Err(e) => {
                warn!(index = base + offset, error = %e, "Dropping embedding with bad dimension");
                result.failed_count += 1;
              }
            }
            if let Some(report) = progress {
              report(base + offset + 1, total);
            }
          }
        }
        Ok(vectors) => {
          warn!(
            expected = batch.len(),
            got = vectors.len(),
            "Backend returned wrong batch size, retrying individually"
          );
          self.retry_individually(&refs, base, total, progress, &mut result).await;
        }
        Err(e) => {
          warn!(error = %e, batch = batch_idx, "Batch embed failed, retrying individually");
          self.retry_individually(&refs, base, total, progress, &mut result).await;
        }
      }

      // Yield between batches so long runs cannot monopolize the executor.
      tokio::task::yield_now().await;
    }

    Ok(result)
  }

  async fn retry_individually(
    &self,
    texts: &[&str],
    base: usize,
    total: usize,
    progress: Option<ProgressFn<'_>>,
    result: &mut BatchEmbeddings,
  ) {
    for (offset, text) in texts.iter().enumerate() {
      match self.backend.embed_batch(&[text]).await {
        Ok(mut vectors) if vectors.len() == 1 => {
          let vector = vectors.pop().expect("length checked");
          match self.validate(&vector) {
            Ok(()) => {
              result.vectors.push(l2_normalize(vector));
              result.succeeded.push(base + offset);
            }
            Err(_) => result.failed_count += 1,
          }
        }
        _ => {
          result.failed_count += 1;
        }
      }
      if let Some(report) = progress {
        report(base + offset + 1, total);
      }
    }
  }

  fn validate(&self, vector: &[f32]) -> Result<(), EmbeddingError> {
    let expected = self.backend.dimensions();
    if vector.len() != expected {
      return Err(EmbeddingError::DimensionMismatch {
        expected,
        got: vector.len(),
      });
    }
    Ok(())
  }
}

fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
  let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
  if norm > 0.0 {
    for v in &mut vector {
      *v /= norm;
    }
  }
  vector
}

// ============================================================================
// Process-wide engine handle
// ============================================================================

static GLOBAL_ENGINE: OnceLock<Arc<EmbeddingEngine>> = OnceLock::new();

/// Install the process-wide engine. First caller wins; later calls return
/// the already-installed engine.
pub fn install_global(engine: Arc<EmbeddingEngine>) -> Arc<EmbeddingEngine> {
  GLOBAL_ENGINE.get_or_init(|| engine).clone()
}

/// The process-wide engine, when one has been installed.
pub fn global() -> Option<Arc<EmbeddingEngine>> {
  GLOBAL_ENGINE.get().cloned()
}

#[cfg(test)]
pub(crate) mod testing {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  /// Deterministic in-process backend for tests.
  ///
  /// Vector content is a hash of the input text spread over the dimension,
  /// so identical texts embed identically. Inputs containing the marker
  /// `"@@fail@@"` error; a configurable wrong-dimension marker exercises
  /// the validation path.
  pub struct FakeBackend {
    pub dimensions: usize,
    pub load_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub embedded_texts: AtomicUsize,
  }

  impl FakeBackend {
    pub fn new(dimensions: usize) -> Self {
      Self {
        dimensions,
        load_calls: AtomicUsize::new(0),
        batch_calls: AtomicUsize::new(0),
        embedded_texts: AtomicUsize::new(0),
      }
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
  impl EmbeddingBackend for FakeBackend {
    fn name(&self) -> &str {
      "fake"
    }

    fn model_id(&self) -> &str {
      "fake-embedder"
    }

    fn dimensions(&self) -> usize {
      self.dimensions
    }

    async fn load(&self) -> Result<(), EmbeddingError> {
      self.load_calls.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
      self.batch_calls.fetch_add(1, Ordering::SeqCst);
      if texts.iter().any(|t| t.contains("@@fail@@")) && texts.len() > 1 {
        return Err(EmbeddingError::Backend("poisoned batch".to_string()));
      }

      let mut out = Vec::with_capacity(texts.len());
      for text in texts {
        if text.contains("@@fail@@") {
          return Err(EmbeddingError::Backend("poisoned input".to_string()));
        }
        if text.contains("@@shortvec@@") {
          out.push(vec![0.1; self.dimensions.saturating_sub(1)]);
        } else {
          out.push(self.vector_for(text));
        }
        self.embedded_texts.fetch_add(1, Ordering::SeqCst);
      }
      Ok(out)
    }
  }
}
