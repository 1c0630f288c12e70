use crate::dataset::{is_mirror_column, Dataset};
use crate::normalize::normalize_text;
use serde::{Deserialize, Serialize};
use strsim::sorensen_dice;
use tracing::debug;

/// Points awarded by each column-matching heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// The whole column name appears inside the fragment
    pub name_in_fragment: u32,
    /// A column-name token equals a fragment token
    pub token_exact: u32,
    /// A column-name token appears somewhere in the fragment
    pub token_partial: u32,
    /// The column name is similar to the whole fragment
    pub fuzzy_match: u32,
    /// Similarity (0.0-1.0) needed for `fuzzy_match`
    pub fuzzy_cutoff: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            name_in_fragment: 3,
            token_exact: 2,
            token_partial: 1,
            fuzzy_match: 1,
            fuzzy_cutoff: 0.5,
        }
    }
}

/// Picks the dataset column a piece of text refers to.
#[derive(Debug, Clone, Default)]
pub struct ColumnResolver {
    pub weights: ScoringWeights,
}

impl ColumnResolver {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Resolve `fragment` against every column of `dataset`.
    pub fn resolve(&self, fragment: &str, dataset: &Dataset, numeric_only: bool) -> Option<String> {
        let columns = dataset.all_columns();
        let candidates: Vec<&str> = columns.iter().map(String::as_str).collect();
        self.resolve_among(fragment, &candidates, dataset, numeric_only)
    }

    /// Resolve `fragment` against `candidates`, in order.
    ///
    /// Mirror columns are never returned. With `numeric_only`, columns that
    /// are not numeric (or cannot be type-checked) are skipped. The strictly
    /// highest score wins, so ties keep the earlier column; a best score of
    /// zero resolves to nothing.
    pub fn resolve_among(
        &self,
        fragment: &str,
        candidates: &[&str],
        dataset: &Dataset,
        numeric_only: bool,
    ) -> Option<String> {
        let fragment = normalize_text(fragment);
        let tokens = fragment_tokens(&fragment);

        let mut best_column: Option<&str> = None;
        let mut best_score = 0;

        for &column in candidates {
            if is_mirror_column(column) {
                continue;
            }
            if numeric_only && !dataset.is_numeric(column) {
                continue;
            }

            let score = self.score(&fragment, &tokens, column);
            debug!("Column score for '{}': {} -> {}", fragment, column, score);

            if score > best_score {
                best_score = score;
                best_column = Some(column);
            }
        }

        best_column.map(str::to_string)
    }

    /// Score one column against an already normalized fragment.
    pub fn score(&self, fragment: &str, tokens: &[&str], column: &str) -> u32 {
        let column = normalize_text(column);
        let weights = &self.weights;
        let mut score = 0;

        if fragment.contains(column.as_str()) {
            score += weights.name_in_fragment;
        }

        for token in column.split('_') {
            if tokens.contains(&token) {
                score += weights.token_exact;
            } else if fragment.contains(token) {
                score += weights.token_partial;
            }
        }

        if self.is_similar(&column, fragment) {
            score += weights.fuzzy_match;
        }

        score
    }

    /// Bigram similarity between a column name and a whole fragment.
    pub fn is_similar(&self, column: &str, fragment: &str) -> bool {
        sorensen_dice(column, fragment) >= self.weights.fuzzy_cutoff
    }
}

/// Whitespace tokens of a fragment, with comparison operators acting as
/// separators too.
pub fn fragment_tokens(fragment: &str) -> Vec<&str> {
    fragment
        .split(|c: char| c.is_whitespace() || matches!(c, '=' | '>' | '<'))
        .filter(|token| !token.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn dataset() -> Dataset {
        let frame = df! [
            "Empresa" => ["ACME", "acme", "Beta"],
            "Valor" => [10i64, 5, 7],
            "valor_total" => [1.5f64, 2.0, 3.0],
            "Cidade" => ["Rio", "Rio", "Recife"]
        ]
        .unwrap();
        Dataset::prepare(frame).unwrap()
    }

    #[test]
    fn test_default_weights() {
        let weights = ScoringWeights::default();
        assert_eq!(weights.name_in_fragment, 3);
        assert_eq!(weights.token_exact, 2);
        assert_eq!(weights.token_partial, 1);
        assert_eq!(weights.fuzzy_match, 1);
        assert!((weights.fuzzy_cutoff - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_score_components() {
        let resolver = ColumnResolver::default();
        let fragment = "soma do valor";
        let tokens = fragment_tokens(fragment);

        // name +3, exact token +2, similarity +1
        assert_eq!(resolver.score(fragment, &tokens, "Valor"), 6);
        assert_eq!(resolver.score(fragment, &tokens, "Empresa"), 0);
    }

    #[test]
    fn test_tokens_split_on_operators() {
        assert_eq!(fragment_tokens("valor>5 e cidade=rio"), vec!["valor", "5", "e", "cidade", "rio"]);
    }

    #[test]
    fn test_resolve_basic() {
        let resolver = ColumnResolver::default();
        let data = dataset();

        assert_eq!(resolver.resolve("empresa", &data, false).as_deref(), Some("Empresa"));
        assert_eq!(resolver.resolve("quais as CIDADES", &data, false).as_deref(), Some("Cidade"));
        assert_eq!(resolver.resolve("xyz", &data, false), None);
    }

    #[test]
    fn test_resolve_numeric_only() {
        let resolver = ColumnResolver::default();
        let data = dataset();

        assert_eq!(resolver.resolve("soma da cidade", &data, true), None);
        assert_eq!(resolver.resolve("soma da cidade", &data, false).as_deref(), Some("Cidade"));
    }

    #[test]
    fn test_resolve_prefers_more_specific_column() {
        let resolver = ColumnResolver::default();
        let data = dataset();

        assert_eq!(
            resolver.resolve("soma do valor_total", &data, true).as_deref(),
            Some("valor_total")
        );
    }

    #[test]
    fn test_mirror_never_returned() {
        let resolver = ColumnResolver::default();
        let data = dataset();

        let picked = resolver.resolve("empresa_norm", &data, false);
        assert_eq!(picked.as_deref(), Some("Empresa"));

        let only_mirrors = ["Empresa_norm", "Valor_norm"];
        assert_eq!(resolver.resolve_among("empresa_norm", &only_mirrors, &data, false), None);
    }

    #[test]
    fn test_ties_keep_first_column() {
        let resolver = ColumnResolver::default();
        let frame = df! [
            "codigo" => ["a"],
            "codigo2" => ["b"]
        ]
        .unwrap();
        let data = Dataset::prepare(frame).unwrap();

        // "codigo" and "codigo2" both reach the same score for "cod"
        let candidates = ["codigo", "codigo2"];
        let first = resolver.resolve_among("cod", &candidates, &data, false);
        let reversed = ["codigo2", "codigo"];
        let second = resolver.resolve_among("cod", &reversed, &data, false);
        assert_eq!(first.as_deref(), Some("codigo"));
        assert_eq!(second.as_deref(), Some("codigo2"));
    }
}
