//! Naming of custom Solidity errors found in revert data.
use alloy::{
    primitives::{Bytes, FixedBytes},
    sol_types::SolError,
};

use super::abi::IMessageService;
use crate::models::ChainError;

fn error_name(signature: &'static str) -> &'static str {
    signature.split('(').next().unwrap_or(signature)
}

/// Selectors of every error the message service contracts can raise.
fn known_errors() -> [(FixedBytes<4>, &'static str); 10] {
    use IMessageService::*;

    fn entry<E: SolError>() -> (FixedBytes<4>, &'static str) {
        (FixedBytes(E::SELECTOR), error_name(E::SIGNATURE))
    }

    [
        entry::<MessageDoesNotExistOrHasAlreadyBeenClaimed>(),
        entry::<MessageAlreadyClaimed>(),
        entry::<MessageSendingFailed>(),
        entry::<FeePaymentFailed>(),
        entry::<RateLimitExceeded>(),
        entry::<ZeroAddressNotAllowed>(),
        entry::<InvalidMerkleProof>(),
        entry::<ProofLengthDifferentThanMerkleDepth>(),
        entry::<L2MerkleRootDoesNotExist>(),
        entry::<IsPaused>(),
    ]
}

/// Name of the custom error encoded in `data`, if it is one of the contract's.
pub fn revert_reason(data: &Bytes) -> Option<&'static str> {
    let selector = data.get(..4)?;
    known_errors()
        .into_iter()
        .find(|(known, _)| known.as_slice() == selector)
        .map(|(_, name)| name)
}

pub fn is_rate_limit_revert(data: &Bytes) -> bool {
    data.get(..4) == Some(IMessageService::RateLimitExceeded::SELECTOR.as_slice())
}

/// Replaces an `unknown` revert reason with the custom error named by the revert data.
pub fn with_revert_reason(err: ChainError) -> ChainError {
    match err {
        ChainError::ExecutionReverted {
            reason,
            data: Some(data),
        } => {
            let reason = revert_reason(&data)
                .map(str::to_string)
                .unwrap_or(reason);
            ChainError::ExecutionReverted {
                reason,
                data: Some(data),
            }
        }
        other => other,
    }
}
