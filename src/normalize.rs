//! Text normalization shared by questions, column names and cell values.
//!
//! Everything is compared in a folded form: compatibility-decomposed,
//! stripped of anything outside ASCII (which removes the diacritics left
//! over by the decomposition), lowercased and trimmed.

use unicode_normalization::UnicodeNormalization;

/// Normalize free text for comparison.
///
/// `normalize_text("  Café ")` is `"cafe"`. Never fails; idempotent.
pub fn normalize_text(text: &str) -> String {
    text.nfkd()
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Like [`normalize_text`], for absent values. `None` yields `""`.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize_text).unwrap_or_default()
}

/// Stricter variant used for dataset cells.
///
/// After [`normalize_text`], drops every character that is not a lowercase
/// letter, digit, whitespace or hyphen. Hyphens stay because codes and dates
/// depend on them.
pub fn normalize_cell(text: &str) -> String {
    normalize_text(text)
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect::<String>()
        .trim()
        .to_string()
}
