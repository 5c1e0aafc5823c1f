//! Chunk-level incremental diff.
//!
//! Given the chunks stored for a file and the chunks from re-chunking it,
//! partition the new set into unchanged / moved / added and the leftovers
//! of the old set into removed. Matching is by chunk hash with FIFO queues
//! per hash, so duplicate chunks pair up stably and a chunk whose
//! normalized text is unchanged is never re-embedded.

use std::collections::{HashMap, VecDeque};

use crate::domain::{Chunk, ExistingChunk};

/// A new chunk matched to a stored one; id and vector come from the
/// stored side, text/span/metadata from the incoming side.
#[derive(Debug, Clone)]
pub struct MatchedChunk {
  pub existing: ExistingChunk,
  pub incoming: Chunk,
}

/// Result of diffing one file's chunks.
#[derive(Debug, Default)]
pub struct ChunkDiff {
  /// Same hash, same line span: nothing to rewrite.
  pub unchanged: Vec<MatchedChunk>,
  /// Same hash, new line span: rewrite position, keep id + vector.
  pub moved: Vec<MatchedChunk>,
  /// No stored counterpart: needs a fresh embedding.
  pub added: Vec<Chunk>,
  /// Stored chunks no longer produced by chunking.
  pub removed: Vec<ExistingChunk>,
}

impl ChunkDiff {
  /// Embeddings we did not have to recompute.
  pub fn embeddings_saved(&self) -> usize {
    self.unchanged.len() + self.moved.len()
  }

  pub fn total_new(&self) -> usize {
    self.unchanged.len() + self.moved.len() + self.added.len()
  }
}

/// Diff stored chunks against a fresh re-chunking of the same file.
pub fn diff_chunks(existing: Vec<ExistingChunk>, new_chunks: Vec<Chunk>) -> ChunkDiff {
  // FIFO buckets keyed by chunk hash. Duplicates pair in order.
  let mut buckets: HashMap<String, VecDeque<ExistingChunk>> = HashMap::new();
  for chunk in existing {
    buckets.entry(chunk.chunk_hash.clone()).or_default().push_back(chunk);
  }

  let mut diff = ChunkDiff::default();

  for incoming in new_chunks {
    let Some(bucket) = buckets.get_mut(&incoming.chunk_hash) else {
      diff.added.push(incoming);
      continue;
    };

    // Prefer an exact line-span match anywhere in the bucket; otherwise
    // take the oldest entry as a move.
    let span_match = bucket
      .iter()
      .position(|e| e.start_line == incoming.start_line && e.end_line == incoming.end_line);

    match span_match {
      Some(idx) => {
        let matched = bucket.remove(idx).expect("position came from the bucket");
        diff.unchanged.push(MatchedChunk {
          existing: matched,
          incoming,
        });
      }
      None => match bucket.pop_front() {
        Some(matched) => diff.moved.push(MatchedChunk {
          existing: matched,
          incoming,
        }),
        None => diff.added.push(incoming),
      },
    }
  }

  for bucket in buckets.into_values() {
    diff.removed.extend(bucket);
  }

  diff
}

/// Incremental diffing only pays off past a handful of chunks.
pub fn should_use_incremental(new_chunk_count: usize) -> bool {
  new_chunk_count > 3
}

/// Post-hoc check: did the diff save at least a quarter of the embeddings?
pub fn was_incremental_worthwhile(diff: &ChunkDiff) -> bool {
  let total = diff.total_new();
  if total == 0 {
    return false;
  }
  diff.embeddings_saved() * 4 >= total
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use uuid::Uuid;

  use super::*;
  use crate::domain::compute_chunk_hash;

  fn existing(text: &str, start: u32, end: u32) -> ExistingChunk {
    ExistingChunk {
      id: Uuid::new_v4(),
      text: text.to_string(),
      start_line: start,
      end_line: end,
      chunk_hash: compute_chunk_hash(text),
      vector: vec![0.5; 4],
    }
  }

  fn incoming(text: &str, start: u32, end: u32) -> Chunk {
    Chunk {
      id: Uuid::new_v4(),
      path: "file.rs".to_string(),
      text: text.to_string(),
      start_line: start,
      end_line: end,
      content_hash: "content".to_string(),
      chunk_hash: compute_chunk_hash(text),
      metadata: None,
    }
  }

  #[test]
  fn test_identical_chunks_unchanged() {
    let old = vec![existing("fn a() {}", 1, 1), existing("fn b() {}", 3, 3)];
    let new = vec![incoming("fn a() {}", 1, 1), incoming("fn b() {}", 3, 3)];

    let diff = diff_chunks(old, new);
    assert_eq!(diff.unchanged.len(), 2);
    assert!(diff.moved.is_empty());
    assert!(diff.added.is_empty());
    assert!(diff.removed.is_empty());
  }

  #[test]
  fn test_shifted_chunks_are_moves_preserving_ids() {
    let old = vec![existing("fn a() {}", 1, 1), existing("fn b() {}", 3, 3)];
    let old_ids: Vec<Uuid> = old.iter().map(|c| c.id).collect();
    // Ten blank lines inserted at the top.
    let new = vec![incoming("fn a() {}", 11, 11), incoming("fn b() {}", 13, 13)];

    let diff = diff_chunks(old, new);
    assert_eq!(diff.unchanged.len(), 0);
    assert_eq!(diff.moved.len(), 2);
    assert_eq!(diff.added.len(), 0);
    assert_eq!(diff.removed.len(), 0);
    assert_eq!(diff.embeddings_saved(), 2);

    let moved_ids: Vec<Uuid> = diff.moved.iter().map(|m| m.existing.id).collect();
    assert_eq!(moved_ids, old_ids);
    assert_eq!(diff.moved[0].incoming.start_line, 11);
  }

  #[test]
  fn test_new_chunk_is_added() {
    let old = vec![existing("fn a() {}", 1, 1)];
    let new = vec![incoming("fn a() {}", 1, 1), incoming("fn brand_new() {}", 3, 3)];

    let diff = diff_chunks(old, new);
    assert_eq!(diff.unchanged.len(), 1);
    assert_eq!(diff.added.len(), 1);
    assert_eq!(diff.added[0].text, "fn brand_new() {}");
  }

  #[test]
  fn test_deleted_chunk_is_removed() {
    let old = vec![existing("fn a() {}", 1, 1), existing("fn gone() {}", 3, 3)];
    let new = vec![incoming("fn a() {}", 1, 1)];

    let diff = diff_chunks(old, new);
    assert_eq!(diff.removed.len(), 1);
    assert_eq!(diff.removed[0].text, "fn gone() {}");
  }

  #[test]
  fn test_duplicate_hashes_fifo() {
    // Two identical chunks at different positions, plus one of them moved.
    let old = vec![existing("fn dup() {}", 1, 1), existing("fn dup() {}", 10, 10)];
    let first_id = old[0].id;
    let new = vec![
      incoming("fn dup() {}", 10, 10), // exact span match with the second
      incoming("fn dup() {}", 20, 20), // moved; pairs FIFO with the first
    ];

    let diff = diff_chunks(old, new);
    assert_eq!(diff.unchanged.len(), 1);
    assert_eq!(diff.unchanged[0].existing.start_line, 10);
    assert_eq!(diff.moved.len(), 1);
    assert_eq!(diff.moved[0].existing.id, first_id);
    assert!(diff.removed.is_empty());
  }

  #[test]
  fn test_multiset_fidelity() {
    // unchanged + moved + added account for every new chunk, and
    // unchanged + moved + removed account for every old chunk.
    let old = vec![
      existing("alpha", 1, 1),
      existing("beta", 2, 2),
      existing("beta", 3, 3),
      existing("gamma", 4, 4),
    ];
    let new = vec![
      incoming("beta", 2, 2),
      incoming("delta", 5, 5),
      incoming("beta", 9, 9),
      incoming("alpha", 1, 1),
    ];
    let old_count = old.len();
    let new_count = new.len();

    let diff = diff_chunks(old, new);
    assert_eq!(diff.unchanged.len() + diff.moved.len() + diff.added.len(), new_count);
    assert_eq!(diff.unchanged.len() + diff.moved.len() + diff.removed.len(), old_count);
  }

  #[test]
  fn test_whitespace_only_change_is_not_a_new_chunk() {
    let old = vec![existing("fn a() {  x();  }", 1, 1)];
    let new = vec![incoming("fn a() {\n    x();\n}", 1, 3)];

    let diff = diff_chunks(old, new);
    // Same normalized hash, different span: a move, not a re-embed.
    assert_eq!(diff.moved.len(), 1);
    assert!(diff.added.is_empty());
  }

  #[test]
  fn test_should_use_incremental_threshold() {
    assert!(!should_use_incremental(0));
    assert!(!should_use_incremental(3));
    assert!(should_use_incremental(4));
  }

  #[test]
  fn test_worthwhile_ratio() {
    let old = vec![
      existing("a", 1, 1),
      existing("b", 2, 2),
      existing("c", 3, 3),
      existing("d", 4, 4),
    ];
    let new = vec![
      incoming("a", 1, 1),
      incoming("x", 2, 2),
      incoming("y", 3, 3),
      incoming("z", 4, 4),
    ];
    let diff = diff_chunks(old, new);
    // 1 of 4 saved = exactly 25%.
    assert!(was_incremental_worthwhile(&diff));

    let old = vec![existing("a", 1, 1)];
    let new = vec![
      incoming("p", 1, 1),
      incoming("q", 2, 2),
      incoming("r", 3, 3),
      incoming("s", 4, 4),
      incoming("t", 5, 5),
    ];
    let diff = diff_chunks(old, new);
    assert!(!was_incremental_worthwhile(&diff));
  }

  #[test]
  fn test_empty_inputs() {
    let diff = diff_chunks(Vec::new(), Vec::new());
    assert_eq!(diff.total_new(), 0);
    assert!(!was_incremental_worthwhile(&diff));

    let diff = diff_chunks(Vec::new(), vec![incoming("a", 1, 1)]);
    assert_eq!(diff.added.len(), 1);

    let diff = diff_chunks(vec![existing("a", 1, 1)], Vec::new());
    assert_eq!(diff.removed.len(), 1);
  }
}
