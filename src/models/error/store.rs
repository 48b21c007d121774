use thiserror::Error;

use crate::models::Message;

/// Underlying cause of a message store failure.
#[derive(Debug, Error, PartialEq)]
pub enum StoreErrorKind {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Failed to acquire lock: {0}")]
    LockError(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(String),

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("An unknown error occurred: {0}")]
    Unknown(String),
}

/// Every failure of the message store, tagged with the operation that raised it.
///
/// When the failing write concerned a single record, that record travels with the error so
/// the caller can resume its cursor from it.
#[derive(Debug, Error)]
#[error("Database error in {operation}: {kind}")]
pub struct StoreError {
    pub operation: &'static str,
    pub kind: StoreErrorKind,
    pub message: Option<Box<Message>>,
}

impl StoreError {
    pub fn new(operation: &'static str, kind: StoreErrorKind) -> Self {
        Self {
            operation,
            kind,
            message: None,
        }
    }

    pub fn with_message(mut self, message: &Message) -> Self {
        self.message = Some(Box::new(message.clone()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::new(
            "insert_if_absent",
            StoreErrorKind::ConnectionError("refused".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Database error in insert_if_absent: Failed to connect to the database: refused"
        );
        assert!(err.message.is_none());
    }
}
