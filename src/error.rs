use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum QaError {
    /// No column matched a fragment that needed one.
    #[error("Não consegui identificar a coluna para a operação.")]
    ColumnResolution,

    #[error("Intenção não reconhecida.")]
    UnrecognizedIntent,

    /// A numeric reduction was attempted on a column that cannot be reduced.
    /// `operation` carries its own article ("somar a", "calcular a média da").
    #[error("Não é possível {operation} coluna '{column}': {reason}")]
    Reduction {
        operation: String,
        column: String,
        reason: String,
    },

    #[error("Sessão não encontrada: {0}")]
    SessionNotFound(Uuid),

    #[error("Requisição inválida: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for QaError {
    fn from(err: polars::error::PolarsError) -> Self {
        QaError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QaError>;
