use thiserror::Error;

/// Failure to compile or evaluate a calldata filter expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    #[error("Invalid function interface: {0}")]
    InvalidFunctionInterface(String),

    #[error("Failed to decode calldata: {0}")]
    Decode(String),
}
