use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope},
    eips::eip2718::Encodable2718,
    network::TxSigner,
    primitives::{Address, Bytes},
    signers::{k256::ecdsa::SigningKey, local::LocalSigner as AlloyLocalSignerClient},
};
use async_trait::async_trait;

use super::ClaimSigner;
use crate::models::{ChainError, SecretString, SignedTransaction};

/// Signs with a private key held in process memory.
pub struct LocalSigner {
    local_signer_client: AlloyLocalSignerClient<SigningKey>,
}

impl LocalSigner {
    /// Builds a signer from a hex encoded private key, with or without `0x` prefix.
    pub fn new(private_key: &SecretString) -> Result<Self, ChainError> {
        let local_signer_client = private_key
            .as_str(|key| key.parse::<AlloyLocalSignerClient<SigningKey>>())
            .map_err(|e| ChainError::Signing(format!("Invalid signer private key: {}", e)))?;

        Ok(Self {
            local_signer_client,
        })
    }
}

#[async_trait]
impl ClaimSigner for LocalSigner {
    fn address(&self) -> Address {
        self.local_signer_client.address()
    }

    async fn sign_transaction(&self, mut tx: TxEip1559) -> Result<SignedTransaction, ChainError> {
        let signature = self
            .local_signer_client
            .sign_transaction(&mut tx)
            .await
            .map_err(|e| ChainError::Signing(format!("Failed to sign transaction: {e}")))?;

        let envelope = TxEnvelope::Eip1559(tx.into_signed(signature));

        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: Bytes::from(envelope.encoded_2718()),
        })
    }
}
