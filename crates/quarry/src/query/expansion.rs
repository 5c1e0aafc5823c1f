//! Query expansion: abbreviation and synonym enrichment.
//!
//! A static dictionary maps common developer shorthand to synonyms
//! (space-separated). Expansion appends new tokens after the originals,
//! deduplicates, and caps the number of added terms. Pure dictionary
//! lookups; typical cost is well under a millisecond.

use std::collections::HashMap;

use std::time::Instant;

/// Built-in abbreviation -> synonyms table.
const EXPANSIONS: &[(&str, &str)] = &[
  // authentication & security
  ("auth", "authentication authorization"),
  ("authn", "authentication"),
  ("authz", "authorization"),
  ("login", "authentication signin"),
  ("signin", "login authentication"),
  ("signup", "register registration"),
  ("jwt", "token authentication"),
  ("oauth", "authentication authorization"),
  ("sso", "authentication"),
  ("acl", "permissions access control"),
  ("perms", "permissions"),
  ("creds", "credentials"),
  ("pwd", "password"),
  ("2fa", "authentication verification"),
  // database
  ("db", "database"),
  ("sql", "database query"),
  ("orm", "database mapping"),
  ("repo", "repository"),
  ("tx", "transaction"),
  ("txn", "transaction"),
  ("migration", "schema database"),
  ("conn", "connection"),
  ("pool", "connection"),
  ("crud", "create read update delete"),
  // api & network
  ("api", "endpoint interface"),
  ("http", "request response"),
  ("req", "request"),
  ("res", "response"),
  ("resp", "response"),
  ("url", "address endpoint"),
  ("uri", "address endpoint"),
  ("ws", "websocket"),
  ("rpc", "remote call"),
  ("grpc", "rpc remote call"),
  ("rest", "api endpoint"),
  ("cors", "cross origin"),
  ("middleware", "handler interceptor"),
  // errors & logging
  ("err", "error"),
  ("exc", "exception"),
  ("log", "logging"),
  ("logger", "logging"),
  ("warn", "warning"),
  ("dbg", "debug"),
  ("trace", "logging debug"),
  ("panic", "error crash"),
  // config
  ("cfg", "config configuration"),
  ("conf", "config configuration"),
  ("env", "environment config"),
  ("opts", "options"),
  ("params", "parameters"),
  ("args", "arguments"),
  ("init", "initialize setup"),
  // testing
  ("spec", "test specification"),
  ("e2e", "end to end test"),
  ("ci", "continuous integration"),
  ("mock", "test stub fake"),
  ("stub", "mock test"),
  ("fixture", "test data"),
  // common abbreviations
  ("fn", "function"),
  ("func", "function"),
  ("impl", "implementation"),
  ("iface", "interface"),
  ("ns", "namespace"),
  ("pkg", "package"),
  ("dir", "directory folder"),
  ("fs", "filesystem"),
  ("io", "input output"),
  ("str", "string"),
  ("num", "number"),
  ("val", "value"),
  ("var", "variable"),
  ("ptr", "pointer"),
  ("ref", "reference"),
  ("util", "utility helper"),
  ("utils", "utility helpers"),
  ("lib", "library"),
  ("deps", "dependencies"),
  ("async", "asynchronous concurrent"),
  ("sync", "synchronous synchronization"),
  ("concurrency", "parallel async"),
  ("perf", "performance"),
  ("mem", "memory"),
  ("doc", "documentation"),
  ("docs", "documentation"),
  ("idx", "index"),
  ("ts", "typescript"),
  ("js", "javascript"),
  ("py", "python"),
  ("rs", "rust"),
];

/// Expansion settings.
#[derive(Debug, Clone)]
pub struct ExpansionConfig {
  pub enabled: bool,
  /// Hard cap on the number of appended terms.
  pub max_expansion_terms: usize,
  /// User-supplied entries; these win over the built-in table.
  pub custom_expansions: HashMap<String, String>,
}

impl Default for ExpansionConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      max_expansion_terms: 10,
      custom_expansions: HashMap::new(),
    }
  }
}

/// Detailed expansion outcome.
#[derive(Debug, Clone)]
pub struct ExpansionDetails {
  pub original_query: String,
  pub expanded_query: String,
  /// Terms appended to the query, in order.
  pub expanded_terms: Vec<String>,
  /// `(matched_token, expansion)` pairs that fired.
  pub applied_expansions: Vec<(String, String)>,
  pub expansion_time_ms: f64,
}

/// Expand a query. Returns it unchanged when disabled.
pub fn expand(query: &str, config: &ExpansionConfig) -> String {
  expand_with_details(query, config).expanded_query
}

/// Expand a query, reporting what happened.
pub fn expand_with_details(query: &str, config: &ExpansionConfig) -> ExpansionDetails {
  let started = Instant::now();

  if !config.enabled {
    return ExpansionDetails {
      original_query: query.to_string(),
      expanded_query: query.to_string(),
      expanded_terms: Vec::new(),
      applied_expansions: Vec::new(),
      expansion_time_ms: elapsed_ms(started),
    };
  }

  let tokens: Vec<&str> = query.split_whitespace().collect();
  let lower_tokens: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();

  let mut expanded_terms: Vec<String> = Vec::new();
  let mut applied: Vec<(String, String)> = Vec::new();

  for (token, lower) in tokens.iter().zip(&lower_tokens) {
    let expansion = config
      .custom_expansions
      .get(lower)
      .map(|s| s.as_str())
      .or_else(|| lookup_builtin(lower));

    let Some(expansion) = expansion else {
      continue;
    };
    applied.push((token.to_string(), expansion.to_string()));

    for term in expansion.split_whitespace() {
      if expanded_terms.len() >= config.max_expansion_terms {
        break;
      }
      let term_lower = term.to_lowercase();
      let already_present =
        lower_tokens.iter().any(|t| *t == term_lower) || expanded_terms.iter().any(|t| *t == term_lower);
      if !already_present {
        expanded_terms.push(term_lower);
      }
    }
  }

  let expanded_query = if expanded_terms.is_empty() {
    query.to_string()
  } else {
    let mut parts: Vec<&str> = tokens.clone();
    for term in &expanded_terms {
      parts.push(term);
    }
    parts.join(" ")
  };

  ExpansionDetails {
    original_query: query.to_string(),
    expanded_query,
    expanded_terms,
    applied_expansions: applied,
    expansion_time_ms: elapsed_ms(started),
  }
}

fn lookup_builtin(token: &str) -> Option<&'static str> {
  EXPANSIONS.iter().find(|(k, _)| *k == token).map(|(_, v)| *v)
}

fn elapsed_ms(started: Instant) -> f64 {
  started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_dictionary_size() {
    assert!(EXPANSIONS.len() >= 50, "need at least 50 entries, have {}", EXPANSIONS.len());
  }

  #[test]
  fn test_basic_expansion() {
    let expanded = expand("auth class", &ExpansionConfig::default());
    assert!(expanded.starts_with("auth class"), "originals come first: {expanded}");
    assert!(expanded.contains("authentication"));
  }

  #[test]
  fn test_disabled_returns_unchanged() {
    let config = ExpansionConfig {
      enabled: false,
      ..Default::default()
    };
    assert_eq!(expand("auth db err", &config), "auth db err");
  }

  #[test]
  fn test_cap_on_expansion_terms() {
    let config = ExpansionConfig {
      max_expansion_terms: 2,
      ..Default::default()
    };
    let details = expand_with_details("auth db api err cfg", &config);
    assert!(details.expanded_terms.len() <= 2);

    let original_len = "auth db api err cfg".split_whitespace().count();
    let expanded_len = details.expanded_query.split_whitespace().count();
    assert!(expanded_len <= original_len + 2);
  }

  #[test]
  fn test_no_duplicate_terms() {
    // "authentication" would be appended twice (auth + login) without dedup.
    let details = expand_with_details("auth login", &ExpansionConfig::default());
    let count = details
      .expanded_terms
      .iter()
      .filter(|t| t.as_str() == "authentication")
      .count();
    assert_eq!(count, 1);
  }

  #[test]
  fn test_original_tokens_not_reappended() {
    // "db" expands to "database"; a query already containing it gains
    // nothing.
    let details = expand_with_details("db database", &ExpansionConfig::default());
    assert!(!details.expanded_terms.contains(&"database".to_string()));
  }

  #[test]
  fn test_custom_expansions_win() {
    let mut custom = HashMap::new();
    custom.insert("auth".to_string(), "oidc".to_string());
    let config = ExpansionConfig {
      custom_expansions: custom,
      ..Default::default()
    };

    let details = expand_with_details("auth", &config);
    assert_eq!(details.expanded_terms, vec!["oidc"]);
  }

  #[test]
  fn test_details_report() {
    let details = expand_with_details("db err", &ExpansionConfig::default());
    assert_eq!(details.original_query, "db err");
    assert_eq!(details.applied_expansions.len(), 2);
    assert!(details.expansion_time_ms < 10.0, "expansion must be fast");
    assert!(details.expanded_query.contains("database"));
    assert!(details.expanded_query.contains("error"));
  }

  #[test]
  fn test_unknown_tokens_untouched() {
    let details = expand_with_details("frobnicate widgets", &ExpansionConfig::default());
    assert_eq!(details.expanded_query, "frobnicate widgets");
    assert!(details.applied_expansions.is_empty());
  }

  #[test]
  fn test_case_insensitive_matching() {
    let expanded = expand("AUTH Db", &ExpansionConfig::default());
    assert!(expanded.contains("authentication"));
    assert!(expanded.contains("database"));
  }
}
