//! Answer values and their string form.

use crate::error::{QaError, Result};
use polars::prelude::*;
use serde::Serialize;
use std::fmt;

/// Result of one operation, serialized to a string at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Count(usize),
    Integer(i64),
    Float(f64),
    /// Distinct non-null values in first-occurrence order
    List(Vec<serde_json::Value>),
    /// Soft failure: why no value could be computed
    Message(String),
}

impl AnswerValue {
    pub fn is_failure(&self) -> bool {
        matches!(self, AnswerValue::Message(_))
    }
}

impl From<QaError> for AnswerValue {
    fn from(err: QaError) -> Self {
        AnswerValue::Message(err.to_string())
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnswerValue::Count(n) => write!(f, "{}", n),
            AnswerValue::Integer(n) => write!(f, "{}", n),
            AnswerValue::Float(x) => write!(f, "{}", x),
            AnswerValue::List(values) => {
                let rendered = serde_json::to_string(values).map_err(|_| fmt::Error)?;
                write!(f, "{}", rendered)
            }
            AnswerValue::Message(message) => write!(f, "{}", message),
        }
    }
}

/// JSON form of the value at `row_idx`.
pub fn series_value_to_json(series: &Series, row_idx: usize) -> Result<serde_json::Value> {
    let any_val = series
        .get(row_idx)
        .map_err(|e| QaError::Polars(format!("Failed to get value: {}", e)))?;

    let value = match any_val {
        AnyValue::Null => serde_json::Value::Null,
        AnyValue::Boolean(b) => serde_json::Value::Bool(b),
        AnyValue::String(s) => serde_json::Value::String(s.to_string()),
        AnyValue::Int8(i) => i.into(),
        AnyValue::Int16(i) => i.into(),
        AnyValue::Int32(i) => i.into(),
        AnyValue::Int64(i) => i.into(),
        AnyValue::UInt8(u) => u.into(),
        AnyValue::UInt16(u) => u.into(),
        AnyValue::UInt32(u) => u.into(),
        AnyValue::UInt64(u) => u.into(),
        AnyValue::Float32(x) => float_to_json(x as f64),
        AnyValue::Float64(x) => float_to_json(x),
        other => serde_json::Value::String(other.to_string()),
    };
    Ok(value)
}

fn float_to_json(x: f64) -> serde_json::Value {
    serde_json::Number::from_f64(x)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(AnswerValue::Count(3).to_string(), "3");
        assert_eq!(AnswerValue::Integer(15).to_string(), "15");
        assert_eq!(AnswerValue::Float(15.0).to_string(), "15");
        assert_eq!(AnswerValue::Float(7.5).to_string(), "7.5");
        assert_eq!(
            AnswerValue::List(vec!["Rio".into(), "Recife".into()]).to_string(),
            r#"["Rio","Recife"]"#
        );
        assert_eq!(AnswerValue::from(QaError::UnrecognizedIntent).to_string(), "Intenção não reconhecida.");
    }

    #[test]
    fn test_series_value_to_json() {
        let series = Series::new("v", &[Some(1.5f64), None]);
        assert_eq!(series_value_to_json(&series, 0).unwrap(), serde_json::json!(1.5));
        assert_eq!(series_value_to_json(&series, 1).unwrap(), serde_json::Value::Null);

        let series = Series::new("s", &["a"]);
        assert_eq!(series_value_to_json(&series, 0).unwrap(), serde_json::json!("a"));
    }
}
