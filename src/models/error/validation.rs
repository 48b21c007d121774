use alloy::primitives::B256;
use thiserror::Error;

use super::{ChainError, Mitigation, ProviderError};

/// Failure while evaluating whether a message is worth claiming.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Gas fee estimation failed: {0}")]
    GasFees(#[from] ProviderError),

    #[error("Compressed transaction size missing: messageHash={0}")]
    MissingCompressedSize(B256),
}

impl ValidationError {
    pub fn mitigation(&self) -> Mitigation {
        match self {
            ValidationError::Chain(err) => err.mitigation(),
            ValidationError::GasFees(err) => ChainError::from(err.clone()).mitigation(),
            ValidationError::MissingCompressedSize(_) => Mitigation::RETRY,
        }
    }
}
