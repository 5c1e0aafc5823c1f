//! Multi-factor re-ranking of candidate hits.
//!
//! Each factor yields a multiplicative boost around 1.0; the final score
//! is `base * Π boostᵢ^weightᵢ`. The base score on the candidate is never
//! mutated, so ranking is idempotent: re-ranking an already ranked list
//! reproduces the same order.

use uuid::Uuid;

use super::intent::{IntentClassification, QueryIntent};
use crate::{domain::ChunkKind, fts::memory::tokenize};

/// A hit entering the ranker. `score` is the merged retrieval score.
#[derive(Debug, Clone)]
pub struct RankCandidate {
  pub id: Uuid,
  pub score: f32,
  pub text: String,
  pub path: String,
  pub start_line: u32,
  pub end_line: u32,
  pub kind: Option<ChunkKind>,
  pub name: Option<String>,
  pub tags: Vec<String>,
  pub docstring: Option<String>,
}

/// The factor breakdown for one candidate, for explainability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankFactors {
  pub chunk_type_boost: f32,
  pub name_boost: f32,
  pub path_boost: f32,
  pub docstring_bonus: f32,
  pub complexity_penalty: f32,
  pub tag_boost: f32,
}

impl RankFactors {
  fn neutral() -> Self {
    Self {
      chunk_type_boost: 1.0,
      name_boost: 1.0,
      path_boost: 1.0,
      docstring_bonus: 1.0,
      complexity_penalty: 1.0,
      tag_boost: 1.0,
    }
  }
}

#[derive(Debug, Clone)]
pub struct RankedCandidate {
  pub candidate: RankCandidate,
  pub final_score: f32,
  pub factors: RankFactors,
}

/// Per-factor exponents; 1.0 leaves the factor as computed.
#[derive(Debug, Clone, Copy)]
pub struct RankWeights {
  pub chunk_type: f32,
  pub name: f32,
  pub path: f32,
  pub docstring: f32,
  pub complexity: f32,
  pub tags: f32,
}

impl Default for RankWeights {
  fn default() -> Self {
    Self {
      chunk_type: 1.0,
      name: 1.0,
      path: 1.0,
      docstring: 1.0,
      complexity: 1.0,
      tags: 1.0,
    }
  }
}

#[derive(Debug, Clone)]
pub struct RankerConfig {
  pub enabled: bool,
  pub weights: RankWeights,
  /// Text length where the mild complexity penalty starts.
  pub mild_length: usize,
  /// Text length where the strong penalty starts.
  pub strong_length: usize,
}

impl Default for RankerConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      weights: RankWeights::default(),
      mild_length: 2000,
      strong_length: 4000,
    }
  }
}

/// Rank candidates for a query under a classified intent.
pub fn rank(
  query: &str,
  intent: &IntentClassification,
  candidates: Vec<RankCandidate>,
  config: &RankerConfig,
) -> Vec<RankedCandidate> {
  let query_tokens = tokenize(query);

  let mut ranked: Vec<RankedCandidate> = candidates
    .into_iter()
    .map(|candidate| {
      let factors = if config.enabled {
        compute_factors(&candidate, &query_tokens, query, intent, config)
      } else {
        RankFactors::neutral()
      };
      let final_score = candidate.score
        * factors.chunk_type_boost.powf(config.weights.chunk_type)
        * factors.name_boost.powf(config.weights.name)
        * factors.path_boost.powf(config.weights.path)
        * factors.docstring_bonus.powf(config.weights.docstring)
        * factors.complexity_penalty.powf(config.weights.complexity)
        * factors.tag_boost.powf(config.weights.tags);

      RankedCandidate {
        candidate,
        final_score,
        factors,
      }
    })
    .collect();

  // Id as tiebreaker keeps the order fully deterministic.
  ranked.sort_by(|a, b| {
    b.final_score
      .partial_cmp(&a.final_score)
      .unwrap_or(std::cmp::Ordering::Equal)
      .then_with(|| a.candidate.id.cmp(&b.candidate.id))
  });
  ranked
}

fn compute_factors(
  candidate: &RankCandidate,
  query_tokens: &[String],
  raw_query: &str,
  intent: &IntentClassification,
  config: &RankerConfig,
) -> RankFactors {
  RankFactors {
    chunk_type_boost: chunk_type_boost(candidate.kind, intent.primary),
    name_boost: name_boost(candidate.name.as_deref(), query_tokens, raw_query),
    path_boost: path_boost(&candidate.path, query_tokens),
    docstring_bonus: docstring_bonus(candidate, intent.primary),
    complexity_penalty: complexity_penalty(&candidate.text, config),
    tag_boost: tag_boost(&candidate.tags, query_tokens),
  }
}

/// Intent-derived boost table over chunk kinds.
fn chunk_type_boost(kind: Option<ChunkKind>, intent: QueryIntent) -> f32 {
  let Some(kind) = kind else {
    return 1.0;
  };

  match intent {
    QueryIntent::Function => match kind {
      ChunkKind::Function | ChunkKind::Method => 1.3,
      ChunkKind::Class | ChunkKind::Impl => 1.05,
      _ => 1.0,
    },
    QueryIntent::Class => match kind {
      ChunkKind::Class | ChunkKind::Struct | ChunkKind::Interface | ChunkKind::Enum | ChunkKind::Trait => 1.3,
      ChunkKind::Impl | ChunkKind::Type => 1.15,
      _ => 1.0,
    },
    QueryIntent::Method => match kind {
      ChunkKind::Method => 1.3,
      ChunkKind::Function | ChunkKind::Impl | ChunkKind::Class => 1.1,
      _ => 1.0,
    },
    QueryIntent::Docs => match kind {
      ChunkKind::Section => 1.3,
      _ => 1.0,
    },
    QueryIntent::Test | QueryIntent::Error => match kind {
      ChunkKind::Function | ChunkKind::Method => 1.1,
      _ => 1.0,
    },
    QueryIntent::Module | QueryIntent::Config | QueryIntent::Other => 1.0,
  }
}

/// Name-match ladder: exact > full token overlap > half > any.
fn name_boost(name: Option<&str>, query_tokens: &[String], raw_query: &str) -> f32 {
  let Some(name) = name else {
    return 1.0;
  };

  if name.eq_ignore_ascii_case(raw_query.trim()) {
    return 1.4;
  }

  let name_tokens = tokenize(name);
  if name_tokens.is_empty() || query_tokens.is_empty() {
    return 1.0;
  }

  let overlap = query_tokens.iter().filter(|t| name_tokens.contains(t)).count();
  let ratio = overlap as f32 / query_tokens.len() as f32;

  if ratio >= 1.0 {
    1.3
  } else if ratio >= 0.5 {
    1.2
  } else if overlap > 0 {
    1.05
  } else {
    1.0
  }
}

/// Path-segment overlap, capped at 1.2. Windows separators normalized.
fn path_boost(path: &str, query_tokens: &[String]) -> f32 {
  let normalized = path.replace('\\', "/").to_lowercase();
  let segments: Vec<String> = normalized
    .split('/')
    .flat_map(|segment| tokenize(segment))
    .collect();

  let hits = query_tokens.iter().filter(|t| segments.contains(t)).count();
  (1.0 + 0.05 * hits as f32).min(1.2)
}

/// Non-trivial docstrings get a nudge; generic container chunks less so
/// when the user asked for a specific entity.
fn docstring_bonus(candidate: &RankCandidate, intent: QueryIntent) -> f32 {
  let has_docs = candidate.docstring.as_deref().is_some_and(|d| d.trim().len() > 10);
  if !has_docs {
    return 1.0;
  }

  let entity_intent = matches!(intent, QueryIntent::Function | QueryIntent::Class | QueryIntent::Method);
  let container_chunk = matches!(candidate.kind, None | Some(ChunkKind::Other));
  if entity_intent && container_chunk {
    1.02
  } else {
    1.05
  }
}

fn complexity_penalty(text: &str, config: &RankerConfig) -> f32 {
  let len = text.len();
  if len >= config.strong_length {
    0.95
  } else if len >= config.mild_length {
    0.98
  } else {
    1.0
  }
}

fn tag_boost(tags: &[String], query_tokens: &[String]) -> f32 {
  if tags.is_empty() {
    return 1.0;
  }
  let lower: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
  let hits = query_tokens.iter().filter(|t| lower.contains(t)).count();
  (1.0 + 0.05 * hits as f32).min(1.15)
}
