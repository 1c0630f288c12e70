use crate::answer::{series_value_to_json, AnswerValue};
use crate::dataset::{is_mirror_column, Dataset};
use crate::error::{QaError, Result};
use crate::intent::Intent;
use polars::prelude::*;
use tracing::warn;

const SUM: &str = "somar a";
const MEAN: &str = "calcular a média da";

/// Runs a classified operation over a (possibly filtered) dataset.
///
/// Never fails: anything that cannot be computed comes back as an
/// [`AnswerValue::Message`].
#[derive(Debug, Clone, Default)]
pub struct OperationExecutor;

impl OperationExecutor {
    pub fn execute(&self, intent: Intent, dataset: &Dataset, column: Option<&str>) -> AnswerValue {
        let column = column.filter(|c| !is_mirror_column(c));

        match (intent, column) {
            (Intent::Unresolved, _) => QaError::UnrecognizedIntent.into(),
            (Intent::Count, None) => AnswerValue::Count(dataset.height()),
            (_, None) | (Intent::ColumnResolutionError, _) => QaError::ColumnResolution.into(),
            (Intent::Count, Some(column)) => self.soft(self.count(dataset, column)),
            (Intent::Sum, Some(column)) => self.soft(self.sum(dataset, column)),
            (Intent::Mean, Some(column)) => self.soft(self.mean(dataset, column)),
            (Intent::List, Some(column)) => self.soft(self.list(dataset, column)),
        }
    }

    fn soft(&self, result: Result<AnswerValue>) -> AnswerValue {
        result.unwrap_or_else(|err| {
            warn!("Operation failed: {}", err);
            err.into()
        })
    }

    /// Non-null values in `column`.
    pub fn count(&self, dataset: &Dataset, column: &str) -> Result<AnswerValue> {
        let series = dataset.frame().column(column)?;
        Ok(AnswerValue::Count(series.len() - series.null_count()))
    }

    /// Integer columns sum exactly; a total that does not fit an `i64`
    /// falls back to a float sum instead of wrapping.
    pub fn sum(&self, dataset: &Dataset, column: &str) -> Result<AnswerValue> {
        let series = numeric_series(dataset, column, SUM)?;
        let dtype = series.dtype();

        let exact = if dtype.is_float() {
            None
        } else if dtype.is_unsigned_integer() {
            series
                .cast(&DataType::UInt64)?
                .u64()?
                .into_iter()
                .flatten()
                .try_fold(0u64, u64::checked_add)
                .and_then(|total| i64::try_from(total).ok())
        } else {
            series
                .cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .flatten()
                .try_fold(0i64, i64::checked_add)
        };

        match exact {
            Some(total) => Ok(AnswerValue::Integer(total)),
            None => {
                if !dtype.is_float() {
                    warn!("Integer sum of '{}' overflows, summing as float", column);
                }
                let total = series.cast(&DataType::Float64)?.f64()?.sum().unwrap_or(0.0);
                Ok(AnswerValue::Float(total))
            }
        }
    }

    pub fn mean(&self, dataset: &Dataset, column: &str) -> Result<AnswerValue> {
        let series = numeric_series(dataset, column, MEAN)?;

        match series.mean() {
            Some(mean) if !mean.is_nan() => Ok(AnswerValue::Float(mean)),
            _ => Err(QaError::Reduction {
                operation: MEAN.to_string(),
                column: column.to_string(),
                reason: "não há valores numéricos".to_string(),
            }),
        }
    }

    /// Distinct non-null values, in the order they first appear.
    pub fn list(&self, dataset: &Dataset, column: &str) -> Result<AnswerValue> {
        let distinct = dataset.frame().column(column)?.drop_nulls().unique_stable()?;

        let values = (0..distinct.len())
            .map(|idx| series_value_to_json(&distinct, idx))
            .collect::<Result<Vec<_>>>()?;
        Ok(AnswerValue::List(values))
    }
}

fn numeric_series<'a>(dataset: &'a Dataset, column: &str, operation: &str) -> Result<&'a Series> {
    let series = dataset.frame().column(column)?;
    if !series.dtype().is_numeric() {
        return Err(QaError::Reduction {
            operation: operation.to_string(),
            column: column.to_string(),
            reason: format!("a coluna não é numérica (tipo {})", series.dtype()),
        });
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        let frame = df! [
            "Cidade" => [Some("Rio"), Some("Recife"), None, Some("Rio"), Some("Natal")],
            "Valor" => [10i64, 5, 7, 2, 1],
            "Preco" => [Some(1.5f64), Some(2.5), None, Some(1.0), Some(1.0)]
        ]
        .unwrap();
        Dataset::prepare(frame).unwrap()
    }

    #[test]
    fn test_count() {
        let exec = OperationExecutor;
        let data = dataset();

        assert_eq!(exec.execute(Intent::Count, &data, None), AnswerValue::Count(5));
        assert_eq!(exec.execute(Intent::Count, &data, Some("Cidade")), AnswerValue::Count(4));
    }

    #[test]
    fn test_sum_and_mean() {
        let exec = OperationExecutor;
        let data = dataset();

        assert_eq!(exec.execute(Intent::Sum, &data, Some("Valor")), AnswerValue::Integer(25));
        assert_eq!(exec.execute(Intent::Sum, &data, Some("Preco")), AnswerValue::Float(6.0));
        assert_eq!(exec.execute(Intent::Mean, &data, Some("Valor")), AnswerValue::Float(5.0));
        assert_eq!(exec.execute(Intent::Mean, &data, Some("Preco")), AnswerValue::Float(1.5));
    }

    #[test]
    fn test_reduction_soft_fails() {
        let exec = OperationExecutor;
        let data = dataset();

        let answer = exec.execute(Intent::Sum, &data, Some("Cidade"));
        assert!(answer.is_failure());
        assert!(answer.to_string().starts_with("Não é possível somar a coluna 'Cidade'"));

        let answer = exec.execute(Intent::Mean, &data, Some("Cidade"));
        assert!(answer.to_string().starts_with("Não é possível calcular a média da coluna 'Cidade'"));

        let answer = exec.execute(Intent::Sum, &data, Some("Missing"));
        assert!(answer.is_failure());
    }

    #[test]
    fn test_integer_sum_does_not_overflow() {
        let exec = OperationExecutor;

        let frame = df! [ "Valor" => [i64::MAX, 1] ].unwrap();
        let data = Dataset::prepare(frame).unwrap();
        match exec.execute(Intent::Sum, &data, Some("Valor")) {
            AnswerValue::Float(total) => assert!(total > 9.2e18),
            other => panic!("unexpected answer: {:?}", other),
        }

        let frame = df! [ "Valor" => [u64::MAX, 1] ].unwrap();
        let data = Dataset::prepare(frame).unwrap();
        match exec.execute(Intent::Sum, &data, Some("Valor")) {
            AnswerValue::Float(total) => assert!(total > 1.8e19),
            other => panic!("unexpected answer: {:?}", other),
        }

        let frame = df! [ "Valor" => [10u64, 5, 7] ].unwrap();
        let data = Dataset::prepare(frame).unwrap();
        assert_eq!(exec.execute(Intent::Sum, &data, Some("Valor")), AnswerValue::Integer(22));

        let frame = df! [ "Valor" => [i64::MAX, -1, 1] ].unwrap();
        let data = Dataset::prepare(frame).unwrap();
        assert_eq!(exec.execute(Intent::Sum, &data, Some("Valor")), AnswerValue::Integer(i64::MAX));
    }

    #[test]
    fn test_list_distinct_in_order() {
        let exec = OperationExecutor;
        let data = dataset();

        assert_eq!(
            exec.execute(Intent::List, &data, Some("Cidade")).to_string(),
            r#"["Rio","Recife","Natal"]"#
        );
    }

    #[test]
    fn test_missing_column_or_intent() {
        let exec = OperationExecutor;
        let data = dataset();

        assert_eq!(
            exec.execute(Intent::Sum, &data, None).to_string(),
            "Não consegui identificar a coluna para a operação."
        );
        assert_eq!(
            exec.execute(Intent::Unresolved, &data, Some("Valor")).to_string(),
            "Intenção não reconhecida."
        );
        assert_eq!(
            exec.execute(Intent::ColumnResolutionError, &data, Some("Valor")).to_string(),
            "Não consegui identificar a coluna para a operação."
        );
        // mirrors are never operated on
        assert_eq!(exec.execute(Intent::Count, &data, Some("Cidade_norm")), AnswerValue::Count(5));
    }
}
