//! Query-time pipeline: expansion, intent, hybrid retrieval, re-ranking.
//!
//! A query is expanded from the abbreviation dictionary, classified for
//! intent, run against both the vector store and the FTS engine, merged
//! by weighted score, and re-ranked by the multi-factor ranker.

pub mod expansion;
pub mod intent;
pub mod ranker;

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

pub use self::{
  expansion::{ExpansionConfig, ExpansionDetails, expand, expand_with_details},
  intent::{IntentClassification, QueryIntent, classify},
  ranker::{RankCandidate, RankFactors, RankedCandidate, RankerConfig, rank},
};
use crate::{
  domain::ChunkKind,
  index::{IndexManager, Result},
};

/// Knobs for one hybrid search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
  pub top_k: usize,
  /// Vector-vs-lexical blend; the two weights are applied as given.
  pub vector_weight: f32,
  pub lexical_weight: f32,
  /// SQL-ish filter pushed down to the vector store.
  pub filter: Option<String>,
  pub expansion: ExpansionConfig,
  pub ranker: RankerConfig,
}

impl Default for SearchOptions {
  fn default() -> Self {
    Self {
      top_k: 10,
      vector_weight: 0.6,
      lexical_weight: 0.4,
      filter: None,
      expansion: ExpansionConfig::default(),
      ranker: RankerConfig::default(),
    }
  }
}

/// One search result after ranking.
#[derive(Debug, Clone)]
pub struct SearchHit {
  pub id: Uuid,
  pub path: String,
  pub text: String,
  pub start_line: u32,
  pub end_line: u32,
  pub score: f32,
  pub kind: Option<ChunkKind>,
  pub name: Option<String>,
  pub factors: RankFactors,
}

/// Full response with query diagnostics.
#[derive(Debug)]
pub struct SearchResponse {
  pub hits: Vec<SearchHit>,
  pub intent: IntentClassification,
  pub expansion: ExpansionDetails,
}

/// Accumulator for score merging across the two retrieval legs.
#[derive(Default)]
struct Merged {
  candidate: Option<RankCandidate>,
  vector_score: f32,
  lexical_score: f32,
}

/// Run a hybrid search against an indexed project.
pub async fn hybrid_search(manager: &IndexManager, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
  let expansion = expand_with_details(query, &options.expansion);
  let intent = classify(query);
  debug!(
    query,
    expanded = %expansion.expanded_query,
    intent = ?intent.primary,
    "Hybrid search"
  );

  let oversample = (options.top_k * 3).max(options.top_k);
  let mut merged: HashMap<Uuid, Merged> = HashMap::new();

  // Semantic leg.
  let query_vector = manager.embedding().embed(&expansion.expanded_query).await?;
  let store = manager.store().await;
  let vector_hits = store
    .search_by_vector(&query_vector, oversample, options.filter.as_deref())
    .await?;

  for (chunk, distance) in vector_hits {
    let entry = merged.entry(chunk.id).or_default();
    entry.vector_score = (1.0 - distance.min(1.0)).max(0.0);
    entry.candidate = Some(RankCandidate {
      id: chunk.id,
      score: 0.0,
      text: chunk.text,
      path: chunk.path,
      start_line: chunk.start_line,
      end_line: chunk.end_line,
      kind: chunk.kind,
      name: chunk.name,
      tags: Vec::new(),
      docstring: chunk.docstring,
    });
  }

  // Lexical leg; scores arrive normalized to [0, 1].
  let fts_hits = manager.fts_search(&expansion.expanded_query, oversample).await?;
  for hit in fts_hits {
    let entry = merged.entry(hit.id).or_default();
    entry.lexical_score = hit.score;
    if entry.candidate.is_none() {
      entry.candidate = Some(RankCandidate {
        id: hit.id,
        score: 0.0,
        text: hit.text,
        path: hit.path,
        start_line: hit.start_line,
        end_line: hit.end_line,
        kind: None,
        name: None,
        tags: Vec::new(),
        docstring: None,
      });
    }
  }

  // Blend and re-rank.
  let candidates: Vec<RankCandidate> = merged
    .into_values()
    .filter_map(|m| {
      let mut candidate = m.candidate?;
      candidate.score = options.vector_weight * m.vector_score + options.lexical_weight * m.lexical_score;
      Some(candidate)
    })
    .collect();

  let ranked = rank(query, &intent, candidates, &options.ranker);

  let hits = ranked
    .into_iter()
    .take(options.top_k)
    .map(|r| SearchHit {
      id: r.candidate.id,
      path: r.candidate.path,
      text: r.candidate.text,
      start_line: r.candidate.start_line,
      end_line: r.candidate.end_line,
      score: r.final_score,
      kind: r.candidate.kind,
      name: r.candidate.name,
      factors: r.factors,
    })
    .collect();

  Ok(SearchResponse {
    hits,
    intent,
    expansion,
  })
}
