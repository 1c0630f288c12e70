//! Runtime configuration, read from the environment.
//!
//! Binaries load a `.env` file first (dotenv), then call
//! [`EngineConfig::from_env`].

use crate::column_resolver::ScoringWeights;
use crate::error::{QaError, Result};
use std::path::Path;
use tracing::info;

pub const BIND_ADDR_VAR: &str = "TABULA_BIND_ADDR";
pub const WEIGHTS_FILE_VAR: &str = "TABULA_WEIGHTS_FILE";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub weights: ScoringWeights,
    pub bind_addr: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var(BIND_ADDR_VAR) {
            config.bind_addr = addr;
        }
        if let Ok(path) = std::env::var(WEIGHTS_FILE_VAR) {
            config.weights = load_weights(&path)?;
        }

        Ok(config)
    }
}

/// Read a scoring weight table from JSON. Missing fields keep their defaults.
pub fn load_weights(path: impl AsRef<Path>) -> Result<ScoringWeights> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let weights: ScoringWeights = serde_json::from_str(&content)?;

    if !(0.0..=1.0).contains(&weights.fuzzy_cutoff) {
        return Err(QaError::Config(format!(
            "fuzzy_cutoff must be between 0 and 1, got {}",
            weights.fuzzy_cutoff
        )));
    }

    info!("Loaded scoring weights from {}", path.display());
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_partial_weights() {
        let path = std::env::temp_dir().join("tabula_qa_weights_partial.json");
        fs::write(&path, r#"{"name_in_fragment": 5}"#).unwrap();

        let weights = load_weights(&path).unwrap();
        assert_eq!(weights.name_in_fragment, 5);
        assert_eq!(weights.token_exact, 2);
        assert!((weights.fuzzy_cutoff - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_bad_cutoff() {
        let path = std::env::temp_dir().join("tabula_qa_weights_bad.json");
        fs::write(&path, r#"{"fuzzy_cutoff": 1.5}"#).unwrap();

        assert!(matches!(load_weights(&path), Err(QaError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_weights("/definitely/not/here.json");
        assert!(matches!(result, Err(QaError::Io(_))));
    }
}
