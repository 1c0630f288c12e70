//! Intent classification.
//!
//! A question is split into an operation segment and an optional filter
//! segment at the first filter-introducing phrase ("onde", "em que", " por ",
//! ...). The operation segment is then matched against fixed keyword
//! catalogs, in priority order mean > sum > count > list.

use crate::column_resolver::ColumnResolver;
use crate::dataset::Dataset;
use crate::normalize::normalize_text;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Phrases that introduce the filter part of a question.
pub const FILTER_PHRASES: &[&str] = &[
    "no qual", "na qual", "nos quais", "nas quais",
    "onde", "em que",
    " por ", " para ",
    " no ", " na ", " nos ", " nas ",
    " em ",
];

pub const MEAN_KEYWORDS: &[&str] = &["media", "valor medio"];

pub const SUM_KEYWORDS: &[&str] = &["soma", "somar", "somatorio", "totalizar", "total da"];

pub const COUNT_KEYWORDS: &[&str] = &["quantos", "quantas", "contagem", "numero de"];

pub const LIST_KEYWORDS: &[&str] = &[
    "listar", "liste", "mostre", "mostra", "mostrar", "exibir", "exiba",
    "quais", "quais sao", "me de", "retornar", "retorne", "trazer", "traga",
];

/// Fallback phrase: "total de X" sums a numeric X and counts anything else.
pub const TOTAL_PHRASE: &str = "total de";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Count,
    Sum,
    Mean,
    List,
    Unresolved,
    ColumnResolutionError,
}

impl Intent {
    /// Sum and mean need a numeric column.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Intent::Sum | Intent::Mean)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Intent::Count => "count",
            Intent::Sum => "sum",
            Intent::Mean => "mean",
            Intent::List => "list",
            Intent::Unresolved => "unresolved",
            Intent::ColumnResolutionError => "column_resolution_error",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of classifying one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    /// Normalized text before the filter phrase (the whole question if none)
    pub operation_segment: String,
    /// Normalized text after the filter phrase
    pub filter_segment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IntentClassifier {
    resolver: ColumnResolver,
}

impl IntentClassifier {
    pub fn new(resolver: ColumnResolver) -> Self {
        Self { resolver }
    }

    pub fn classify(&self, dataset: &Dataset, question: &str) -> Classification {
        let normalized = normalize_text(question);

        let (operation_segment, filter_segment) = match find_filter_phrase(&normalized) {
            Some((pos, phrase)) => {
                let operation = normalized[..pos].trim().to_string();
                let filter = normalized[pos + phrase.len()..].trim().to_string();
                debug!("Split question at '{}': '{}' | '{}'", phrase, operation, filter);
                (operation, Some(filter).filter(|f| !f.is_empty()))
            }
            None => (normalized, None),
        };

        let intent = self.classify_operation(dataset, &operation_segment);

        Classification {
            intent,
            operation_segment,
            filter_segment,
        }
    }

    fn classify_operation(&self, dataset: &Dataset, segment: &str) -> Intent {
        if contains_any(segment, MEAN_KEYWORDS) {
            return Intent::Mean;
        }
        if contains_any(segment, SUM_KEYWORDS) {
            return Intent::Sum;
        }
        if contains_any(segment, COUNT_KEYWORDS) {
            return Intent::Count;
        }
        if contains_any(segment, LIST_KEYWORDS) {
            return Intent::List;
        }

        if segment.contains(TOTAL_PHRASE) {
            return match self.resolver.resolve(segment, dataset, false) {
                Some(column) if dataset.is_numeric(&column) => Intent::Sum,
                Some(_) => Intent::Count,
                None => Intent::ColumnResolutionError,
            };
        }

        Intent::Unresolved
    }
}

/// Earliest filter phrase in `question`, as (byte offset, phrase).
///
/// Positions are compared where the phrase's words start, so " em " and
/// "em que" found at the same word tie; ties go to the longer phrase.
pub fn find_filter_phrase(question: &str) -> Option<(usize, &'static str)> {
    let mut phrases: Vec<&'static str> = FILTER_PHRASES.to_vec();
    phrases.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut best: Option<(usize, usize, &'static str)> = None;
    for phrase in phrases {
        if let Some(pos) = question.find(phrase) {
            let word_start = pos + (phrase.len() - phrase.trim_start().len());
            match best {
                Some((best_start, _, _)) if best_start <= word_start => {}
                _ => best = Some((word_start, pos, phrase)),
            }
        }
    }
    best.map(|(_, pos, phrase)| (pos, phrase))
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword))
}
