//! In-memory BM25 engine.
//!
//! Tokenizer (fixed for reproducibility): text is split on any
//! non-alphanumeric character, each fragment is further split on camelCase
//! humps, and every emitted token is lowercased. Identifiers that split
//! into humps also emit the whole identifier, so `AuthService` matches
//! both `auth` and `authservice`. Scoring is standard BM25 with k1 = 1.2
//! and b = 0.75.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FtsEngine, FtsEngineType, FtsError, FtsHit, FtsStats};
use crate::domain::Chunk;

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Split text into search tokens. See the module docs for the contract.
pub fn tokenize(text: &str) -> Vec<String> {
  let mut tokens = Vec::new();

  for fragment in text.split(|c: char| !c.is_alphanumeric()) {
    if fragment.is_empty() {
      continue;
    }

    let humps = split_camel(fragment);
    if humps.len() > 1 {
      tokens.push(fragment.to_lowercase());
    }
    for hump in humps {
      tokens.push(hump.to_lowercase());
    }
  }

  tokens
}

fn split_camel(word: &str) -> Vec<&str> {
  let mut parts = Vec::new();
  let mut start = 0;
  let chars: Vec<(usize, char)> = word.char_indices().collect();

  for window in chars.windows(2) {
    let (_, current) = window[0];
    let (next_idx, next) = window[1];
    if current.is_lowercase() && next.is_uppercase() {
      parts.push(&word[start..next_idx]);
      start = next_idx;
    }
  }
  parts.push(&word[start..]);
  parts
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDoc {
  path: String,
  text: String,
  start_line: u32,
  end_line: u32,
  length: u32,
}

/// Serialized engine state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct MemoryIndexState {
  postings: HashMap<String, HashMap<Uuid, u32>>,
  docs: HashMap<Uuid, StoredDoc>,
  total_length: u64,
}

/// The in-memory BM25 engine.
#[derive(Debug, Default)]
pub struct MemoryFtsEngine {
  state: MemoryIndexState,
  closed: bool,
}

impl MemoryFtsEngine {
  pub fn new() -> Self {
    Self::default()
  }

  fn avg_doc_length(&self) -> f32 {
    if self.state.docs.is_empty() {
      return 0.0;
    }
    self.state.total_length as f32 / self.state.docs.len() as f32
  }

  fn remove_doc(&mut self, id: &Uuid) {
    if let Some(doc) = self.state.docs.remove(id) {
      self.state.total_length -= doc.length as u64;
      for postings in self.state.postings.values_mut() {
        postings.remove(id);
      }
      self.state.postings.retain(|_, p| !p.is_empty());
    }
  }

  fn ensure_open(&self) -> Result<(), FtsError> {
    if self.closed {
      return Err(FtsError::NotInitialized);
    }
    Ok(())
  }
}

impl FtsEngine for MemoryFtsEngine {
  fn engine_type(&self) -> FtsEngineType {
    FtsEngineType::Memory
  }

  fn add_chunk(&mut self, chunk: &Chunk) -> Result<(), FtsError> {
    self.ensure_open()?;

    // Re-adding an id replaces its previous postings.
    self.remove_doc(&chunk.id);

    let tokens = tokenize(&chunk.text);
    let length = tokens.len() as u32;

    for token in &tokens {
      *self
        .state
        .postings
        .entry(token.clone())
        .or_default()
        .entry(chunk.id)
        .or_insert(0) += 1;
    }

    self.state.total_length += length as u64;
    self.state.docs.insert(
      chunk.id,
      StoredDoc {
        path: chunk.path.clone(),
        text: chunk.text.clone(),
        start_line: chunk.start_line,
        end_line: chunk.end_line,
        length,
      },
    );

    Ok(())
  }

  fn add_chunks(&mut self, chunks: &[Chunk]) -> Result<(), FtsError> {
    for chunk in chunks {
      self.add_chunk(chunk)?;
    }
    Ok(())
  }

  fn search(&self, query: &str, top_k: usize) -> Result<Vec<FtsHit>, FtsError> {
    self.ensure_open()?;

    let terms = tokenize(query);
    if terms.is_empty() || self.state.docs.is_empty() {
      return Ok(Vec::new());
    }

    let doc_count = self.state.docs.len() as f32;
    let avg_len = self.avg_doc_length();
    let mut scores: HashMap<Uuid, f32> = HashMap::new();

    for term in &terms {
      let Some(postings) = self.state.postings.get(term) else {
        continue;
      };
      let df = postings.len() as f32;
      let idf = ((doc_count - df + 0.5) / (df + 0.5) + 1.0).ln();

      for (doc_id, &tf) in postings {
        let doc_len = self.state.docs.get(doc_id).map(|d| d.length).unwrap_or(0) as f32;
        let tf = tf as f32;
        let score = idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * doc_len / avg_len.max(1.0)));
        *scores.entry(*doc_id).or_insert(0.0) += score;
      }
    }

    let mut hits: Vec<FtsHit> = scores
      .into_iter()
      .filter_map(|(id, score)| {
        self.state.docs.get(&id).map(|doc| FtsHit {
          id,
          path: doc.path.clone(),
          text: doc.text.clone(),
          start_line: doc.start_line,
          end_line: doc.end_line,
          score,
        })
      })
      .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(top_k);
    Ok(hits)
  }

  fn remove_by_path(&mut self, path: &str) -> Result<(), FtsError> {
    self.ensure_open()?;

    let ids: Vec<Uuid> = self
      .state
      .docs
      .iter()
      .filter(|(_, doc)| doc.path == path)
      .map(|(id, _)| *id)
      .collect();

    for id in ids {
      self.remove_doc(&id);
    }
    Ok(())
  }

  fn normalize_scores(&self, hits: &mut [FtsHit]) {
    let max = hits.iter().map(|h| h.score).fold(0.0f32, f32::max);
    if max > 0.0 {
      for hit in hits {
        hit.score /= max;
      }
    }
  }

  fn has_data(&self) -> bool {
    !self.state.docs.is_empty()
  }

  fn stats(&self) -> FtsStats {
    FtsStats {
      documents: self.state.docs.len(),
      terms: self.state.postings.len(),
    }
  }

  fn serialize(&self) -> Result<Vec<u8>, FtsError> {
    Ok(serde_json::to_vec(&self.state)?)
  }

  fn deserialize(&mut self, bytes: &[u8]) -> Result<(), FtsError> {
    self.state = serde_json::from_slice(bytes)?;
    Ok(())
  }

  fn close(&mut self) -> Result<(), FtsError> {
    self.closed = true;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::compute_chunk_hash;

  fn chunk(path: &str, text: &str, start: u32) -> Chunk {
    Chunk {
      id: Uuid::new_v4(),
      path: path.to_string(),
      text: text.to_string(),
      start_line: start,
      end_line: start + 2,
      content_hash: "c".to_string(),
      chunk_hash: compute_chunk_hash(text),
      metadata: None,
    }
  }

  #[test]
  fn test_tokenize_splits_identifiers() {
    let tokens = tokenize("AuthService handles user_login");
    assert!(tokens.contains(&"auth".to_string()));
    assert!(tokens.contains(&"service".to_string()));
    assert!(tokens.contains(&"authservice".to_string()));
    assert!(tokens.contains(&"user".to_string()));
    assert!(tokens.contains(&"login".to_string()));
  }

  #[test]
  fn test_search_ranks_relevant_first() {
    let mut engine = MemoryFtsEngine::new();
    engine
      .add_chunks(&[
        chunk("src/auth.rs", "fn authenticate(user: &User) -> Token { verify(user) }", 1),
        chunk("src/math.rs", "fn add(a: i32, b: i32) -> i32 { a + b }", 1),
        chunk("src/db.rs", "fn connect(url: &str) -> Connection { open(url) }", 1),
      ])
      .unwrap();

    let hits = engine.search("authenticate user", 10).unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].path, "src/auth.rs");
  }

  #[test]
  fn test_re_add_replaces() {
    let mut engine = MemoryFtsEngine::new();
    let mut c = chunk("a.rs", "old searchable content", 1);
    engine.add_chunk(&c).unwrap();

    c.text = "completely different words".to_string();
    engine.add_chunk(&c).unwrap();

    assert_eq!(engine.stats().documents, 1);
    assert!(engine.search("searchable", 10).unwrap().is_empty());
    assert!(!engine.search("different", 10).unwrap().is_empty());
  }

  #[test]
  fn test_remove_by_path() {
    let mut engine = MemoryFtsEngine::new();
    engine
      .add_chunks(&[
        chunk("keep.rs", "fn keep_me() {}", 1),
        chunk("drop.rs", "fn drop_me() {}", 1),
        chunk("drop.rs", "fn also_dropped() {}", 5),
      ])
      .unwrap();

    engine.remove_by_path("drop.rs").unwrap();
    assert_eq!(engine.stats().documents, 1);
    assert!(engine.search("drop_me", 10).unwrap().is_empty());
  }

  #[test]
  fn test_normalize_maps_max_to_one() {
    let mut engine = MemoryFtsEngine::new();
    engine
      .add_chunks(&[
        chunk("a.rs", "token token token token", 1),
        chunk("b.rs", "token other words here", 1),
      ])
      .unwrap();

    let mut hits = engine.search("token", 10).unwrap();
    engine.normalize_scores(&mut hits);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert!(hits[1].score <= 1.0);
  }

  #[test]
  fn test_serialize_roundtrip() {
    let mut engine = MemoryFtsEngine::new();
    engine.add_chunk(&chunk("a.rs", "roundtrip content here", 1)).unwrap();

    let bytes = engine.serialize().unwrap();
    let mut restored = MemoryFtsEngine::new();
    restored.deserialize(&bytes).unwrap();

    assert_eq!(restored.stats().documents, 1);
    assert_eq!(restored.search("roundtrip", 10).unwrap().len(), 1);
  }

  #[test]
  fn test_closed_engine_errors() {
    let mut engine = MemoryFtsEngine::new();
    engine.close().unwrap();
    assert!(matches!(
      engine.add_chunk(&chunk("a.rs", "x", 1)),
      Err(FtsError::NotInitialized)
    ));
  }

  #[test]
  fn test_empty_query() {
    let mut engine = MemoryFtsEngine::new();
    engine.add_chunk(&chunk("a.rs", "content", 1)).unwrap();
    assert!(engine.search("", 10).unwrap().is_empty());
    assert!(engine.search("!!!", 10).unwrap().is_empty());
  }

  #[test]
  fn test_has_data() {
    let mut engine = MemoryFtsEngine::new();
    assert!(!engine.has_data());
    engine.add_chunk(&chunk("a.rs", "data", 1)).unwrap();
    assert!(engine.has_data());
  }
}
