use alloy::primitives::Bytes;
use thiserror::Error;

use super::ProviderError;

/// Revert reasons that will not change by resubmitting the same claim.
pub const NON_RETRYABLE_REVERT_REASONS: &[&str] = &[
    "MessageDoesNotExistOrHasAlreadyBeenClaimed",
    "MessageAlreadyClaimed",
    "MessageSendingFailed",
    "InvalidMerkleProof",
    "ProofLengthDifferentThanMerkleDepth",
    "L2MerkleRootDoesNotExist",
    "ZeroAddressNotAllowed",
];

/// What a caller should do after a chain call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mitigation {
    pub should_retry: bool,
}

impl Mitigation {
    pub const RETRY: Mitigation = Mitigation { should_retry: true };
    pub const DO_NOT_RETRY: Mitigation = Mitigation {
        should_retry: false,
    };
}

/// Failure of a message service or log client call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChainError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Execution reverted: {reason}")]
    ExecutionReverted {
        reason: String,
        data: Option<Bytes>,
    },

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Nonce conflict: {0}")]
    NonceConflict(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Unknown chain error: {0}")]
    Unknown(String),
}

impl ChainError {
    pub fn mitigation(&self) -> Mitigation {
        match self {
            ChainError::Network(_)
            | ChainError::NonceConflict(_)
            | ChainError::InsufficientFunds(_)
            | ChainError::InvalidResponse(_) => Mitigation::RETRY,
            ChainError::ExecutionReverted { reason, .. } => {
                if NON_RETRYABLE_REVERT_REASONS.contains(&reason.as_str()) {
                    Mitigation::DO_NOT_RETRY
                } else {
                    Mitigation::RETRY
                }
            }
            ChainError::Rejected(_) | ChainError::Signing(_) | ChainError::Unknown(_) => {
                Mitigation::DO_NOT_RETRY
            }
        }
    }
}

impl From<ProviderError> for ChainError {
    fn from(err: ProviderError) -> Self {
        if err.is_transient() {
            return ChainError::Network(err.to_string());
        }

        match err {
            ProviderError::Rpc {
                code,
                message,
                revert_data,
            } => {
                let lower = message.to_lowercase();
                if code == 3 || revert_data.is_some() || lower.contains("execution reverted") {
                    let reason = message
                        .split_once("execution reverted:")
                        .map(|(_, reason)| reason.trim().to_string())
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| "unknown".to_string());
                    ChainError::ExecutionReverted {
                        reason,
                        data: revert_data,
                    }
                } else if code == 4001 || lower.contains("rejected") || lower.contains("denied") {
                    ChainError::Rejected(message)
                } else if lower.contains("nonce too low")
                    || lower.contains("nonce too high")
                    || lower.contains("replacement transaction underpriced")
                    || lower.contains("already known")
                {
                    ChainError::NonceConflict(message)
                } else if lower.contains("insufficient funds") {
                    ChainError::InsufficientFunds(message)
                } else {
                    ChainError::Unknown(format!("RPC error {}: {}", code, message))
                }
            }
            ProviderError::InvalidResponse(msg) => ChainError::InvalidResponse(msg),
            other => ChainError::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc(code: i64, message: &str) -> ProviderError {
        ProviderError::Rpc {
            code,
            message: message.to_string(),
            revert_data: None,
        }
    }

    #[test]
    fn test_transient_errors_are_retried() {
        let err = ChainError::from(ProviderError::Timeout);
        assert!(matches!(err, ChainError::Network(_)));
        assert_eq!(err.mitigation(), Mitigation::RETRY);
    }

    #[test]
    fn test_known_revert_is_not_retried() {
        let err = ChainError::from(rpc(
            3,
            "execution reverted: MessageDoesNotExistOrHasAlreadyBeenClaimed",
        ));
        assert_eq!(
            err,
            ChainError::ExecutionReverted {
                reason: "MessageDoesNotExistOrHasAlreadyBeenClaimed".to_string(),
                data: None
            }
        );
        assert_eq!(err.mitigation(), Mitigation::DO_NOT_RETRY);
    }

    #[test]
    fn test_unknown_revert_is_retried() {
        let err = ChainError::from(rpc(-32000, "execution reverted"));
        assert_eq!(
            err,
            ChainError::ExecutionReverted {
                reason: "unknown".to_string(),
                data: None
            }
        );
        assert_eq!(err.mitigation(), Mitigation::RETRY);
    }

    #[test]
    fn test_rejection_is_not_retried() {
        let err = ChainError::from(rpc(4001, "User rejected the request"));
        assert!(matches!(err, ChainError::Rejected(_)));
        assert_eq!(err.mitigation(), Mitigation::DO_NOT_RETRY);
    }

    #[test]
    fn test_nonce_conflict_is_retried() {
        let err = ChainError::from(rpc(-32000, "nonce too low"));
        assert!(matches!(err, ChainError::NonceConflict(_)));
        assert_eq!(err.mitigation(), Mitigation::RETRY);
    }

    #[test]
    fn test_unclassified_rpc_error_is_unknown() {
        let err = ChainError::from(rpc(-32601, "method not found"));
        assert!(matches!(err, ChainError::Unknown(_)));
        assert_eq!(err.mitigation(), Mitigation::DO_NOT_RETRY);
    }
}
