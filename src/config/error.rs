//! Error types for configuration system.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Missing env var: {0}")]
    MissingEnvVar(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Invalid calldata filter: {0}")]
    InvalidCalldataFilter(String),
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(u64),
}
