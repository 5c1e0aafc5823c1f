//! HTTP embedding backend speaking the Ollama batch protocol.
//!
//! POSTs `{ model, input: [...] }` to `<base>/api/embed` and expects
//! `{ embeddings: [[f32]] }` back, one vector per input in order.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::{EmbeddingBackend, EmbeddingError};
use crate::config::EmbeddingSettings;

#[derive(Debug, Clone)]
pub struct HttpBackend {
  client: reqwest::Client,
  base_url: String,
  model: String,
  dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
  model: &'a str,
  input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
  embeddings: Vec<Vec<f32>>,
}

impl HttpBackend {
  pub fn new(settings: &EmbeddingSettings) -> Self {
    info!(
      base_url = %settings.base_url,
      model = %settings.model,
      dimensions = settings.dimensions,
      "HTTP embedding backend configured"
    );
    Self {
      client: reqwest::Client::new(),
      base_url: settings.base_url.clone(),
      model: settings.model.clone(),
      dimensions: settings.dimensions,
    }
  }

  fn embed_url(&self) -> String {
    format!("{}/api/embed", self.base_url)
  }
}

#[async_trait]
impl EmbeddingBackend for HttpBackend {
  fn name(&self) -> &str {
    "http"
  }

  fn model_id(&self) -> &str {
    &self.model
  }

  fn dimensions(&self) -> usize {
    self.dimensions
  }

  /// Warm the model by embedding a trivial probe input.
  async fn load(&self) -> Result<(), EmbeddingError> {
    debug!(model = %self.model, "Warming embedding model");
    let started = Instant::now();
    match self.embed_batch(&["warmup"]).await {
      Ok(_) => {
        debug!(elapsed_ms = started.elapsed().as_millis(), "Embedding model ready");
        Ok(())
      }
      Err(e) => Err(EmbeddingError::ModelLoadFailed(e.to_string())),
    }
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let request = EmbedRequest {
      model: &self.model,
      input: texts.to_vec(),
    };

    trace!(batch_size = texts.len(), model = %self.model, "Sending embedding request");
    let started = Instant::now();

    let response = self.client.post(self.embed_url()).json(&request).send().await?;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      warn!(status = %status, batch_size = texts.len(), "Embedding request failed");
      return Err(EmbeddingError::Backend(format!("server returned {status}: {body}")));
    }

    let parsed: EmbedResponse = response.json().await?;
    trace!(
      embeddings = parsed.embeddings.len(),
      elapsed_ms = started.elapsed().as_millis(),
      "Embedding response parsed"
    );

    if parsed.embeddings.len() != texts.len() {
      return Err(EmbeddingError::Backend(format!(
        "got {} embeddings for {} inputs",
        parsed.embeddings.len(),
        texts.len()
      )));
    }

    Ok(parsed.embeddings)
  }
}
