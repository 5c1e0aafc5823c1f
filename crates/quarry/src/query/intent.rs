//! Query intent classification.
//!
//! Cheap keyword heuristics decide what kind of thing the user is looking
//! for; the result drives ranking weights and FTS query construction.
//! This is a dictionary pass, not a model: it must stay well under a
//! millisecond.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
  Function,
  Class,
  Method,
  Module,
  Config,
  Test,
  Docs,
  Error,
  Other,
}

/// Classification plus how sure the heuristics are (0.0 - 1.0).
#[derive(Debug, Clone, PartialEq)]
pub struct IntentClassification {
  pub primary: QueryIntent,
  pub confidence: f32,
}

/// Keyword groups per intent. A hit on any keyword votes for its intent;
/// multiple hits raise confidence.
const INTENT_KEYWORDS: &[(QueryIntent, &[&str])] = &[
  (
    QueryIntent::Function,
    &["function", "fn", "func", "method body", "implementation", "call", "invoke", "handler", "callback", "lambda", "closure"],
  ),
  (
    QueryIntent::Class,
    &["class", "struct", "interface", "trait", "type", "model", "entity", "schema", "enum", "record"],
  ),
  (QueryIntent::Method, &["method", "member", "getter", "setter", "accessor"]),
  (
    QueryIntent::Module,
    &["module", "package", "namespace", "crate", "library", "file", "import", "export"],
  ),
  (
    QueryIntent::Config,
    &["config", "configuration", "settings", "options", "env", "environment", "setup", "toml", "yaml", "json", "flags"],
  ),
  (
    QueryIntent::Test,
    &["test", "tests", "spec", "assert", "mock", "fixture", "unit test", "integration test", "coverage"],
  ),
  (
    QueryIntent::Docs,
    &["docs", "documentation", "readme", "guide", "tutorial", "example", "usage", "how to", "howto"],
  ),
  (
    QueryIntent::Error,
    &["error", "exception", "panic", "crash", "bug", "fail", "failure", "throw", "catch", "stack trace", "traceback"],
  ),
];

/// Classify a raw query.
pub fn classify(query: &str) -> IntentClassification {
  let lower = query.to_lowercase();
  let tokens: Vec<&str> = lower.split_whitespace().collect();
  if tokens.is_empty() {
    return IntentClassification {
      primary: QueryIntent::Other,
      confidence: 0.0,
    };
  }

  let mut best: Option<(QueryIntent, u32)> = None;
  for (intent, keywords) in INTENT_KEYWORDS {
    let mut hits = 0u32;
    for keyword in *keywords {
      let matched = if keyword.contains(' ') {
        lower.contains(keyword)
      } else {
        tokens.iter().any(|t| t.trim_matches(|c: char| !c.is_alphanumeric()) == *keyword)
      };
      if matched {
        hits += 1;
      }
    }
    if hits > 0 && best.map(|(_, b)| hits > b).unwrap_or(true) {
      best = Some((*intent, hits));
    }
  }

  match best {
    Some((intent, hits)) => IntentClassification {
      primary: intent,
      // One keyword is a moderate signal; each extra hit firms it up.
      confidence: (0.5 + 0.15 * (hits - 1) as f32).min(0.95),
    },
    None => IntentClassification {
      primary: QueryIntent::Other,
      confidence: 0.3,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_function_intent() {
    let c = classify("function to parse json");
    assert_eq!(c.primary, QueryIntent::Function);
    assert!(c.confidence >= 0.5);
  }

  #[test]
  fn test_class_intent() {
    assert_eq!(classify("auth class").primary, QueryIntent::Class);
    assert_eq!(classify("user struct definition").primary, QueryIntent::Class);
  }

  #[test]
  fn test_error_intent() {
    assert_eq!(classify("panic on startup").primary, QueryIntent::Error);
    assert_eq!(classify("stack trace from watcher").primary, QueryIntent::Error);
  }

  #[test]
  fn test_config_intent() {
    assert_eq!(classify("environment settings").primary, QueryIntent::Config);
  }

  #[test]
  fn test_docs_intent() {
    assert_eq!(classify("how to install").primary, QueryIntent::Docs);
  }

  #[test]
  fn test_other_when_no_keywords() {
    let c = classify("frobnicate the widget");
    assert_eq!(c.primary, QueryIntent::Other);
    assert!(c.confidence < 0.5);
  }

  #[test]
  fn test_empty_query() {
    let c = classify("");
    assert_eq!(c.primary, QueryIntent::Other);
    assert_eq!(c.confidence, 0.0);
  }

  #[test]
  fn test_more_hits_more_confidence() {
    let one = classify("test this");
    let many = classify("unit test fixture with mock and assert");
    assert!(many.confidence > one.confidence);
  }
}
