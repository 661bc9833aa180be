use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Merge error: {0}")]
    Merge(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MigrateError>;
