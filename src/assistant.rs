//! Query Assistant - answers a natural-language question about a dataset
//!
//! Pipeline:
//! 1. Classify the intent and split off the filter segment
//! 2. Extract filter predicates from the filter segment
//! 3. Narrow the dataset with the predicates
//! 4. Resolve the column the operation runs on
//! 5. Execute the operation and render the result as a string

use crate::column_resolver::{ColumnResolver, ScoringWeights};
use crate::config::EngineConfig;
use crate::dataset::{is_mirror_column, Dataset};
use crate::filters::{FilterApplier, FilterExtractor, FilterPredicate};
use crate::intent::{Classification, Intent, IntentClassifier};
use crate::operators::OperationExecutor;
use crate::answer::AnswerValue;
use serde::Serialize;
use tracing::{info, warn};

/// Answer plus the trail of decisions that produced it
#[derive(Debug, Clone, Serialize)]
pub struct AssistantResponse {
    /// Final answer, always a string
    pub answer: String,

    /// Classified intent
    pub intent: Intent,

    /// Predicates applied before the operation
    pub filters: Vec<FilterPredicate>,

    /// Column the operation ran on
    pub column: Option<String>,

    /// Rows left after filtering
    pub row_count: usize,

    /// Reasoning steps taken
    pub reasoning_steps: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryAssistant {
    resolver: ColumnResolver,
    classifier: IntentClassifier,
    extractor: FilterExtractor,
    applier: FilterApplier,
    executor: OperationExecutor,
}

impl QueryAssistant {
    pub fn new(weights: ScoringWeights) -> Self {
        let resolver = ColumnResolver::new(weights);
        Self {
            classifier: IntentClassifier::new(resolver.clone()),
            extractor: FilterExtractor::new(resolver.clone()),
            applier: FilterApplier,
            executor: OperationExecutor,
            resolver,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.weights)
    }

    /// Answer `question`. Never fails; problems come back as explanations.
    pub fn answer(&self, dataset: &Dataset, question: &str) -> String {
        self.respond(dataset, question).answer
    }

    /// Answer `question` and keep the reasoning trail.
    pub fn respond(&self, dataset: &Dataset, question: &str) -> AssistantResponse {
        let mut reasoning_steps = vec![format!("Analyzing question: {}", question)];

        let classification = self.classifier.classify(dataset, question);
        reasoning_steps.push(format!(
            "Intent: {} (operation: '{}', filter: {})",
            classification.intent,
            classification.operation_segment,
            classification.filter_segment.as_deref().unwrap_or("none")
        ));

        let filters = self
            .extractor
            .extract(classification.filter_segment.as_deref(), dataset);
        for filter in &filters {
            reasoning_steps.push(format!("Filter: {}", filter));
        }

        let working = if filters.is_empty() {
            dataset.clone()
        } else {
            match self.applier.apply(dataset, &filters) {
                Ok(filtered) => filtered,
                Err(e) => {
                    warn!("Could not apply filters: {}", e);
                    reasoning_steps.push(format!("Filter application failed: {}", e));
                    return AssistantResponse {
                        answer: format!("Não foi possível aplicar os filtros: {}", e),
                        intent: classification.intent,
                        filters,
                        column: None,
                        row_count: dataset.height(),
                        reasoning_steps,
                    };
                }
            }
        };
        reasoning_steps.push(format!("{} of {} rows selected", working.height(), dataset.height()));

        let column = self.operation_column(dataset, question, &classification);
        reasoning_steps.push(match &column {
            Some(column) => format!("Operation column: {}", column),
            None => "No operation column resolved".to_string(),
        });

        let mut result = self
            .executor
            .execute(classification.intent, &working, column.as_deref());
        if classification.intent == Intent::Count && column.is_none() {
            result = AnswerValue::Count(working.height());
        }

        let answer = result.to_string();
        info!(
            "Answered '{}' -> {} (intent: {}, filters: {}, column: {:?})",
            question,
            answer,
            classification.intent,
            filters.len(),
            column
        );

        AssistantResponse {
            answer,
            intent: classification.intent,
            filters,
            column,
            row_count: working.height(),
            reasoning_steps,
        }
    }

    /// Column the operation runs on.
    ///
    /// The operation segment is tried first, then the whole question. Sum and
    /// mean look at numeric columns only; if none resolves but some other
    /// column does, that column is returned so the reduction can explain why
    /// it is not numeric.
    fn operation_column(
        &self,
        dataset: &Dataset,
        question: &str,
        classification: &Classification,
    ) -> Option<String> {
        let numeric_only = classification.intent.is_numeric();
        let lookup = |numeric_only: bool| {
            self.resolver
                .resolve(&classification.operation_segment, dataset, numeric_only)
                .or_else(|| self.resolver.resolve(question, dataset, numeric_only))
        };

        let column = match lookup(numeric_only) {
            Some(column) => Some(column),
            None if numeric_only => lookup(false),
            None => None,
        };

        column.filter(|c| !is_mirror_column(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn dataset() -> Dataset {
        let frame = df! [
            "Empresa" => ["ACME", "acme", "Beta"],
            "Valor" => [10i64, 5, 7]
        ]
        .unwrap();
        Dataset::prepare(frame).unwrap()
    }

    #[test]
    fn test_sum_with_filter() {
        let assistant = QueryAssistant::default();
        let response = assistant.respond(&dataset(), "soma do valor onde empresa = acme");

        assert_eq!(response.answer, "15");
        assert_eq!(response.intent, Intent::Sum);
        assert_eq!(response.column.as_deref(), Some("Valor"));
        assert_eq!(response.filters.len(), 1);
        assert_eq!(response.row_count, 2);
    }

    #[test]
    fn test_count_rows() {
        let assistant = QueryAssistant::default();
        assert_eq!(assistant.answer(&dataset(), "quantos registros onde empresa = beta"), "1");
        assert_eq!(assistant.answer(&dataset(), "quantos registros"), "3");
    }

    #[test]
    fn test_unrecognized() {
        let assistant = QueryAssistant::default();
        assert_eq!(assistant.answer(&dataset(), "bom dia"), "Intenção não reconhecida.");
    }

    #[test]
    fn test_reasoning_steps_recorded() {
        let assistant = QueryAssistant::default();
        let response = assistant.respond(&dataset(), "media do valor");

        assert_eq!(response.answer, "7.333333333333333");
        assert!(response.reasoning_steps.iter().any(|s| s.starts_with("Intent: mean")));
        assert!(response.reasoning_steps.iter().any(|s| s == "Operation column: Valor"));
    }
}
