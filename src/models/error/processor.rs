use thiserror::Error;

use super::{ChainError, Mitigation, ProviderError, StoreError, ValidationError};

/// Failure of a single processing step on one message.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<ProviderError> for ProcessorError {
    fn from(err: ProviderError) -> Self {
        ProcessorError::Chain(err.into())
    }
}

impl ProcessorError {
    /// Store failures are always retried from the same cursor.
    pub fn mitigation(&self) -> Mitigation {
        match self {
            ProcessorError::Store(_) => Mitigation::RETRY,
            ProcessorError::Chain(err) => err.mitigation(),
            ProcessorError::Validation(err) => err.mitigation(),
        }
    }
}
