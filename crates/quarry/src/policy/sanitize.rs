//! Path sanitization for policy matching.
//!
//! Attackers can smuggle sensitive files past deny rules with lookalike
//! paths: `.env\u{200B}` renders identically to `.env` but string-compares
//! differently. Every path is NFC-normalized and stripped of invisible and
//! BiDi-control characters before any rule is evaluated.

use unicode_normalization::UnicodeNormalization;

/// Characters that render as nothing or reorder surrounding text.
fn is_invisible(c: char) -> bool {
  matches!(
    c,
    '\u{200B}'..='\u{200F}'   // zero-width space/joiner/non-joiner, LRM, RLM
      | '\u{202A}'..='\u{202E}' // BiDi embedding/override controls
      | '\u{2060}'..='\u{2064}' // word joiner, invisible operators
      | '\u{2066}'..='\u{2069}' // BiDi isolate controls
      | '\u{FEFF}'              // BOM / zero-width no-break space
      | '\u{00AD}' // soft hyphen
  )
}

/// Normalize a relative path for rule matching.
///
/// - Unicode NFC normalization
/// - invisible / BiDi-control characters removed
/// - backslashes rewritten to forward slashes
pub fn sanitize_path(path: &str) -> String {
  path
    .nfc()
    .filter(|c| !is_invisible(*c))
    .map(|c| if c == '\\' { '/' } else { c })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_strips_zero_width() {
    assert_eq!(sanitize_path(".env\u{200B}"), ".env");
    assert_eq!(sanitize_path("src/\u{200D}main.rs"), "src/main.rs");
  }

  #[test]
  fn test_strips_bidi_overrides() {
    assert_eq!(sanitize_path("secrets\u{202E}txt.env"), "secretstxt.env");
    assert_eq!(sanitize_path("\u{2066}x\u{2069}.pem"), "x.pem");
  }

  #[test]
  fn test_nfc_normalization() {
    // "é" as combining sequence vs precomposed
    let decomposed = "caf\u{0065}\u{0301}.md";
    let precomposed = "caf\u{00E9}.md";
    assert_eq!(sanitize_path(decomposed), sanitize_path(precomposed));
  }

  #[test]
  fn test_backslashes_normalized() {
    assert_eq!(sanitize_path("src\\lib\\mod.rs"), "src/lib/mod.rs");
  }

  #[test]
  fn test_plain_paths_untouched() {
    assert_eq!(sanitize_path("src/main.rs"), "src/main.rs");
  }
}
