use thiserror::Error;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Datastore error: {0}")]
    Datastore(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::prelude::PolarsError> for QaError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        QaError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QaError>;
