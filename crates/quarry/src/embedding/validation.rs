//! Input budgeting for embedding backends.
//!
//! Embedding models have a fixed context window; oversized chunks must be
//! clamped before they reach the backend or the request fails wholesale.
//! Token counts are estimated from character length.

use tracing::warn;

use crate::config::CHARS_PER_TOKEN;

/// Token budget for a single embedding input.
#[derive(Debug, Clone)]
pub struct InputBudget {
  pub max_tokens: usize,
  pub chars_per_token: usize,
}

impl InputBudget {
  pub fn for_context_length(context_length: usize) -> Self {
    Self {
      max_tokens: context_length,
      chars_per_token: CHARS_PER_TOKEN,
    }
  }

  pub fn max_chars(&self) -> usize {
    self.max_tokens * self.chars_per_token
  }

  pub fn estimate_tokens(&self, text: &str) -> usize {
    text.len() / self.chars_per_token
  }
}

/// What happened to an input during clamping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClampResult {
  Unchanged,
  Truncated { original_len: usize, clamped_len: usize },
}

/// Clamp text to the budget, cutting at a character boundary.
pub fn clamp_input(text: &str, budget: &InputBudget) -> (String, ClampResult) {
  if budget.estimate_tokens(text) <= budget.max_tokens {
    return (text.to_string(), ClampResult::Unchanged);
  }

  let clamped: String = text.chars().take(budget.max_chars()).collect();
  warn!(
    original_len = text.len(),
    clamped_len = clamped.len(),
    max_tokens = budget.max_tokens,
    "Embedding input exceeds model context, truncating"
  );

  let result = ClampResult::Truncated {
    original_len: text.len(),
    clamped_len: clamped.len(),
  };
  (clamped, result)
}
