//! Hybrid search and ranking scenarios.

mod common;

use common::{open_manager, write_file};
use quarry::{SearchOptions, hybrid_search};
use tempfile::TempDir;

#[tokio::test]
async fn class_query_ranks_class_chunk_first() {
  let temp = TempDir::new().unwrap();
  write_file(
    &temp,
    "src/auth/service.ts",
    "export class AuthService {\n  login(): void {\n    verify();\n  }\n}\n",
  );
  write_file(
    &temp,
    "src/utils/index.ts",
    "// utility helpers\nexport const pad = (s: string) => s.trim();\n",
  );

  let (_, manager) = open_manager(&temp).await;
  manager.create_index(None).await.unwrap();

  let response = hybrid_search(&manager, "auth class", &SearchOptions::default())
    .await
    .unwrap();

  // Expansion kicked in.
  assert!(
    response.expansion.expanded_terms.contains(&"authentication".to_string()),
    "expansion should add authentication, got {:?}",
    response.expansion.expanded_terms
  );

  // Intent classified as class-seeking.
  assert_eq!(response.intent.primary, quarry::query::QueryIntent::Class);

  // The AuthService chunk wins: chunk-type boost, name overlap, path hit.
  assert!(!response.hits.is_empty());
  let top = &response.hits[0];
  assert_eq!(top.path, "src/auth/service.ts", "hits: {:?}", response.hits);
  assert!(top.factors.chunk_type_boost >= 1.0);
  assert!(top.factors.name_boost > 1.0);
}

#[tokio::test]
async fn lexical_leg_finds_exact_identifiers() {
  let temp = TempDir::new().unwrap();
  write_file(
    &temp,
    "src/billing.rs",
    "pub fn calculate_invoice_total(items: &[Item]) -> u64 {\n    items.iter().map(|i| i.price).sum()\n}\n",
  );
  write_file(&temp, "src/other.rs", "pub fn unrelated() {}\n");

  let (_, manager) = open_manager(&temp).await;
  manager.create_index(None).await.unwrap();

  let response = hybrid_search(&manager, "calculate_invoice_total", &SearchOptions::default())
    .await
    .unwrap();

  assert!(!response.hits.is_empty());
  assert_eq!(response.hits[0].path, "src/billing.rs");
}

#[tokio::test]
async fn top_k_limits_results() {
  let temp = TempDir::new().unwrap();
  for i in 0..20 {
    write_file(
      &temp,
      &format!("src/handler_{i}.rs"),
      &format!("pub fn request_handler_{i}() {{\n    process_request();\n}}\n"),
    );
  }

  let (_, manager) = open_manager(&temp).await;
  manager.create_index(None).await.unwrap();

  let options = SearchOptions {
    top_k: 5,
    ..Default::default()
  };
  let response = hybrid_search(&manager, "request handler", &options).await.unwrap();
  assert!(response.hits.len() <= 5);
  assert!(!response.hits.is_empty());
}

#[tokio::test]
async fn search_scores_are_ordered() {
  let temp = TempDir::new().unwrap();
  write_file(&temp, "src/a.rs", "pub fn database_connection() { open_pool(); }\n");
  write_file(&temp, "src/b.rs", "pub fn database_query() { run(); }\n");
  write_file(&temp, "src/c.rs", "pub fn unrelated_helper() {}\n");

  let (_, manager) = open_manager(&temp).await;
  manager.create_index(None).await.unwrap();

  let response = hybrid_search(&manager, "database connection", &SearchOptions::default())
    .await
    .unwrap();

  for pair in response.hits.windows(2) {
    assert!(pair[0].score >= pair[1].score, "hits must be sorted by score");
  }
}

#[tokio::test]
async fn disabled_expansion_leaves_query_alone() {
  let temp = TempDir::new().unwrap();
  write_file(&temp, "src/a.rs", "pub fn auth_check() {}\n");

  let (_, manager) = open_manager(&temp).await;
  manager.create_index(None).await.unwrap();

  let options = SearchOptions {
    expansion: quarry::query::ExpansionConfig {
      enabled: false,
      ..Default::default()
    },
    ..Default::default()
  };
  let response = hybrid_search(&manager, "auth check", &options).await.unwrap();
  assert_eq!(response.expansion.expanded_query, "auth check");
  assert!(response.expansion.expanded_terms.is_empty());
}
