//! Transaction signing for claim transactions.
mod local_signer;
pub use local_signer::*;

use alloy::{consensus::TxEip1559, primitives::Address};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::models::{ChainError, SignedTransaction};

#[async_trait]
#[cfg_attr(test, automock)]
pub trait ClaimSigner: Send + Sync {
    /// Address transactions are sent from.
    fn address(&self) -> Address;

    /// Signs an EIP-1559 transaction and returns its EIP-2718 encoding.
    async fn sign_transaction(&self, tx: TxEip1559) -> Result<SignedTransaction, ChainError>;
}
