//! Dataset wrapper holding the original columns plus their normalized mirrors.
//!
//! For every original column `C` a mirror column `C_norm` holds the
//! cell-normalized text of each value. Text filters compare against the
//! mirrors while numeric work keeps using the typed originals.

use crate::error::Result;
use crate::normalize::normalize_cell;
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

/// Suffix that marks a mirror column.
pub const MIRROR_SUFFIX: &str = "_norm";

/// Whether `name` is a mirror column, judged by its suffix alone.
pub fn is_mirror_column(name: &str) -> bool {
    name.ends_with(MIRROR_SUFFIX)
}

/// Name of the mirror column for `column`.
pub fn mirror_name(column: &str) -> String {
    format!("{}{}", column, MIRROR_SUFFIX)
}

/// Read-only table the question pipeline runs against.
///
/// Cloning is cheap: polars shares the column buffers.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    /// Add one mirror column per original column.
    ///
    /// Original columns are never touched. Columns that already look like
    /// mirrors are skipped, and so is any column whose mirror already exists,
    /// which makes preparing an already prepared frame a no-op.
    pub fn prepare(frame: DataFrame) -> Result<Self> {
        let mut frame = frame;
        let names: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        for name in &names {
            if is_mirror_column(name) {
                continue;
            }
            let mirror = mirror_name(name);
            if names.contains(&mirror) {
                warn!("Mirror column {} already present, leaving it as is", mirror);
                continue;
            }
            let series = mirror_series(frame.column(name)?, &mirror)?;
            frame.with_column(series)?;
        }

        debug!(
            "Prepared dataset: {} rows, {} columns (with mirrors)",
            frame.height(),
            frame.width()
        );
        Ok(Self { frame })
    }

    /// Wrap a frame that came out of a filter over a prepared dataset.
    pub(crate) fn from_prepared(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Original column names in column order. Mirrors are never listed.
    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .filter(|name| !is_mirror_column(name))
            .map(|s| s.to_string())
            .collect()
    }

    /// Every column name in the frame, mirrors included.
    pub fn all_columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Whether `column` holds numeric values. A missing column is not numeric.
    pub fn is_numeric(&self, column: &str) -> bool {
        self.frame
            .column(column)
            .map(|series| series.dtype().is_numeric())
            .unwrap_or(false)
    }
}

fn mirror_series(series: &Series, mirror: &str) -> Result<Series> {
    let as_text = series.cast(&DataType::String)?;
    let values: Vec<Option<String>> = as_text
        .str()?
        .into_iter()
        .map(|value| value.map(normalize_cell))
        .collect();
    Ok(Series::new(mirror, values))
}

/// Load a CSV file with a header row and prepare it.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Dataset> {
    let frame = LazyCsvReader::new(path.as_ref())
        .with_has_header(true)
        .finish()?
        .collect()?;
    Dataset::prepare(frame)
}

/// Parse CSV bytes (header row first) and prepare them.
pub fn read_csv_bytes(bytes: &[u8]) -> Result<Dataset> {
    let frame = CsvReader::new(Cursor::new(bytes.to_vec())).finish()?;
    Dataset::prepare(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df! [
            "Empresa" => [Some("ACME"), Some("São Bento"), None],
            "Valor" => [10i64, 5, 7]
        ]
        .unwrap()
    }

    #[test]
    fn test_prepare_adds_mirrors() {
        let dataset = Dataset::prepare(sample()).unwrap();

        assert_eq!(dataset.columns(), vec!["Empresa", "Valor"]);
        assert_eq!(
            dataset.all_columns(),
            vec!["Empresa", "Valor", "Empresa_norm", "Valor_norm"]
        );

        let mirror = dataset.frame().column("Empresa_norm").unwrap();
        let mirror = mirror.str().unwrap();
        assert_eq!(mirror.get(0), Some("acme"));
        assert_eq!(mirror.get(1), Some("sao bento"));
        assert_eq!(mirror.get(2), None);

        let numbers = dataset.frame().column("Valor_norm").unwrap();
        assert_eq!(numbers.str().unwrap().get(0), Some("10"));
    }

    #[test]
    fn test_prepare_keeps_originals_and_is_idempotent() {
        let once = Dataset::prepare(sample()).unwrap();
        let twice = Dataset::prepare(once.frame().clone()).unwrap();

        assert_eq!(once.all_columns(), twice.all_columns());
        let original = twice.frame().column("Empresa").unwrap();
        assert_eq!(original.str().unwrap().get(0), Some("ACME"));
    }

    #[test]
    fn test_is_numeric() {
        let dataset = Dataset::prepare(sample()).unwrap();
        assert!(dataset.is_numeric("Valor"));
        assert!(!dataset.is_numeric("Empresa"));
        assert!(!dataset.is_numeric("Valor_norm"));
        assert!(!dataset.is_numeric("missing"));
    }

    #[test]
    fn test_read_csv_bytes() {
        let csv = b"cidade,valor\nRio,10\nSao Paulo,3\n";
        let dataset = read_csv_bytes(csv).unwrap();
        assert_eq!(dataset.height(), 2);
        assert_eq!(dataset.columns(), vec!["cidade", "valor"]);
        assert!(dataset.is_numeric("valor"));
    }
}
