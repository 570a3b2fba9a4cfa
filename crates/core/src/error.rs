use std::path::PathBuf;
use thiserror::Error;

pub type RoasResult<T> = Result<T, RoasError>;

#[derive(Error, Debug)]
pub enum RoasError {
    #[error("Missing input: {}", display_paths(.paths))]
    MissingInput { paths: Vec<PathBuf> },

    #[error("Schema error: column '{column}' not found in {source_name} (observed columns: {observed:?})")]
    Schema {
        column: String,
        source_name: String,
        observed: Vec<String>,
    },

    #[error("Data format error: column '{column}' in {source_name} has non-numeric value '{value}'")]
    DataFormat {
        column: String,
        source_name: String,
        value: String,
    },

    #[error("Missing value: column '{column}' in {source_name} is blank at line {line}")]
    MissingValue {
        column: String,
        source_name: String,
        line: u64,
    },

    #[error("Invalid analysis window: {0}")]
    InvalidWindow(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
