//! Filter extraction and application.
//!
//! A filter segment such as `empresa = acme e valor > 5` becomes a list of
//! predicates that are applied one after another, each one narrowing the
//! rows left by the previous one.

use crate::column_resolver::ColumnResolver;
use crate::dataset::{mirror_name, Dataset};
use crate::error::Result;
use crate::normalize::{normalize_cell, normalize_text};
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

lazy_static! {
    /// Clause patterns, in the order they are scanned.
    static ref PATTERNS: Vec<(FilterOp, Regex)> = vec![
        (FilterOp::Eq, pattern(r"(?P<col>\w+)\s*(?P<op>=)\s*(?P<val>[\w\s\-\.:/]+)")),
        (FilterOp::Eq, pattern(r"(?P<col>\w+)\s*(?P<op>==)\s*(?P<val>[\w\s\-\.:/]+)")),
        (FilterOp::NotEq, pattern(r"(?P<col>\w+)\s*(?P<op>!=)\s*(?P<val>[\w\s\-\.:/]+)")),
        (FilterOp::GreaterThan, pattern(r"(?P<col>\w+)\s*(?P<op>>)\s*(?P<val>[\d\.]+)")),
        (FilterOp::LessThan, pattern(r"(?P<col>\w+)\s*(?P<op><)\s*(?P<val>[\d\.]+)")),
    ];

    static ref CONJUNCTION: Regex = pattern(r"\s*[,;]\s*|\s+(?:e|and)\s+");
}

fn pattern(source: &str) -> Regex {
    Regex::new(source).unwrap_or_else(|e| panic!("invalid filter pattern {}: {}", source, e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    NotEq,
    GreaterThan,
    LessThan,
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            FilterOp::Eq => "=",
            FilterOp::NotEq => "!=",
            FilterOp::GreaterThan => ">",
            FilterOp::LessThan => "<",
        };
        write!(f, "{}", symbol)
    }
}

/// Value side of a predicate, decided once at extraction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    Numeric(f64),
    Text(String),
}

impl FilterValue {
    /// Numeric when `raw` parses as a finite number, normalized text otherwise.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => FilterValue::Numeric(number),
            _ => FilterValue::Text(normalize_cell(raw)),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FilterValue::Numeric(number) => write!(f, "{}", number),
            FilterValue::Text(text) => write!(f, "'{}'", text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub column: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op, self.value)
    }
}

/// One pattern hit inside a clause.
struct Capture<'a> {
    op: FilterOp,
    op_start: usize,
    op_end: usize,
    column: &'a str,
    value: &'a str,
}

impl Capture<'_> {
    fn overlaps(&self, other: &Capture) -> bool {
        self.op_start < other.op_end && other.op_start < self.op_end
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterExtractor {
    resolver: ColumnResolver,
}

impl FilterExtractor {
    pub fn new(resolver: ColumnResolver) -> Self {
        Self { resolver }
    }

    /// Turn a filter segment into predicates. `None` or empty yields none.
    pub fn extract(&self, segment: Option<&str>, dataset: &Dataset) -> Vec<FilterPredicate> {
        let segment = match segment {
            Some(s) if !s.trim().is_empty() => normalize_text(s),
            _ => return Vec::new(),
        };

        let mut predicates = Vec::new();
        for clause in split_clauses(&segment) {
            for capture in scan_clause(clause) {
                let column = match self.resolver.resolve(capture.column, dataset, false) {
                    Some(column) => column,
                    None => {
                        warn!("No column matches filter token '{}', skipping", capture.column);
                        continue;
                    }
                };

                let raw = normalize_text(capture.value);
                let raw = raw.trim_end_matches(|c: char| ".,;!?: ".contains(c));
                let value = match FilterValue::parse(raw) {
                    // "codigo = 001" on a text column matches "001", not "1"
                    FilterValue::Numeric(_)
                        if matches!(capture.op, FilterOp::Eq | FilterOp::NotEq)
                            && !dataset.is_numeric(&column) =>
                    {
                        FilterValue::Text(normalize_cell(raw))
                    }
                    value => value,
                };

                if matches!(capture.op, FilterOp::GreaterThan | FilterOp::LessThan)
                    && !matches!(value, FilterValue::Numeric(_))
                {
                    warn!("Ignoring non-numeric bound '{}' for {}", raw, column);
                    continue;
                }

                let predicate = FilterPredicate {
                    column,
                    op: capture.op,
                    value,
                };
                debug!("Extracted filter: {}", predicate);
                predicates.push(predicate);
            }
        }
        predicates
    }
}

/// Split a segment at conjunctions, but only where both sides carry an
/// operator. "cidade = sao paulo e regiao" stays one clause.
pub fn split_clauses(segment: &str) -> Vec<&str> {
    let bounds: Vec<(usize, usize)> = CONJUNCTION
        .find_iter(segment)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut clauses = Vec::new();
    let mut start = 0;
    for (i, &(sep_start, sep_end)) in bounds.iter().enumerate() {
        let next = bounds.get(i + 1).map(|b| b.0).unwrap_or(segment.len());
        let head = &segment[start..sep_start];
        let tail = &segment[sep_end..next];
        if has_operator(head) && has_operator(tail) {
            clauses.push(head.trim());
            start = sep_end;
        }
    }
    clauses.push(segment[start..].trim());
    clauses.retain(|clause| !clause.is_empty());
    clauses
}

fn has_operator(text: &str) -> bool {
    text.contains(['=', '>', '<'])
}

/// Run every pattern over one clause. Hits that claim the same operator
/// characters are collapsed onto the longer operator, so `a != b` is a single
/// inequality rather than an inequality plus an equality.
fn scan_clause(clause: &str) -> Vec<Capture<'_>> {
    let mut captures: Vec<Capture> = Vec::new();

    for (op, regex) in PATTERNS.iter() {
        for caps in regex.captures_iter(clause) {
            let (Some(column), Some(operator), Some(value)) =
                (caps.name("col"), caps.name("op"), caps.name("val"))
            else {
                continue;
            };

            let capture = Capture {
                op: *op,
                op_start: operator.start(),
                op_end: operator.end(),
                column: column.as_str(),
                value: value.as_str(),
            };

            match captures.iter().position(|c| c.overlaps(&capture)) {
                Some(idx) => {
                    let existing = &captures[idx];
                    if capture.op_end - capture.op_start > existing.op_end - existing.op_start {
                        captures[idx] = capture;
                    }
                }
                None => captures.push(capture),
            }
        }
    }
    captures
}

/// Narrows a dataset by a conjunction of predicates.
#[derive(Debug, Clone, Default)]
pub struct FilterApplier;

impl FilterApplier {
    /// Apply `predicates` left to right. The input dataset is not modified;
    /// every step materializes a new frame.
    pub fn apply(&self, dataset: &Dataset, predicates: &[FilterPredicate]) -> Result<Dataset> {
        let mut frame = dataset.frame().clone();

        for predicate in predicates {
            let before = frame.height();
            frame = frame
                .lazy()
                .filter(predicate_expr(predicate))
                .collect()?;
            debug!("Filter {} kept {} of {} rows", predicate, frame.height(), before);
        }

        Ok(Dataset::from_prepared(frame))
    }
}

fn predicate_expr(predicate: &FilterPredicate) -> Expr {
    match &predicate.value {
        FilterValue::Numeric(number) => {
            // Only bounds reach here for text columns; unparsable cells drop out.
            let column = col(&predicate.column).cast(DataType::Float64);
            let number = lit(*number);
            match predicate.op {
                FilterOp::GreaterThan => column.gt(number),
                FilterOp::LessThan => column.lt(number),
                FilterOp::NotEq => column.neq(number),
                FilterOp::Eq => column.eq(number),
            }
        }
        FilterValue::Text(text) => {
            let mirror = col(&mirror_name(&predicate.column)).fill_null(lit(""));
            let text = lit(text.as_str());
            match predicate.op {
                FilterOp::NotEq => mirror.neq(text),
                _ => mirror.eq(text),
            }
        }
    }
}
