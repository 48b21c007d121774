//! Pre-computes the compressed size of claim transactions landing on Linea.
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use log::{error, info, warn};

use super::{MessageProcessor, NonceCoordinator};
use crate::{
    models::{ChainError, ClaimOverrides, Direction, Message, MessageStatus, ProcessorError},
    repositories::MessageRepository,
    services::{
        estimate_compressed_size, ChainProviderTrait, LineaGasProvider, MessageServiceClientTrait,
    },
};

#[derive(Debug, Clone)]
pub struct TransactionSizeProcessorConfig {
    pub direction: Direction,
    pub origin_contract_address: Address,
    pub fee_recipient: Address,
}

/// Signs a representative claim of the oldest anchored message, never broadcasting it,
/// and records its compressed size and gas limit.
pub struct L2ClaimMessageTransactionSizeProcessor<R, C, P>
where
    R: MessageRepository,
    C: MessageServiceClientTrait,
    P: ChainProviderTrait,
{
    repository: Arc<R>,
    client: Arc<C>,
    gas_provider: Arc<LineaGasProvider<P>>,
    nonce_coordinator: Arc<NonceCoordinator<R, P>>,
    config: TransactionSizeProcessorConfig,
}

impl<R, C, P> L2ClaimMessageTransactionSizeProcessor<R, C, P>
where
    R: MessageRepository + 'static,
    C: MessageServiceClientTrait + 'static,
    P: ChainProviderTrait + 'static,
{
    pub fn new(
        repository: Arc<R>,
        client: Arc<C>,
        gas_provider: Arc<LineaGasProvider<P>>,
        nonce_coordinator: Arc<NonceCoordinator<R, P>>,
        config: TransactionSizeProcessorConfig,
    ) -> Self {
        Self {
            repository,
            client,
            gas_provider,
            nonce_coordinator,
            config,
        }
    }

    async fn compute(&self, message: &mut Message) -> Result<bool, ProcessorError> {
        let fee_recipient = self.config.fee_recipient;
        let request = self.client.build_claim_request(message, fee_recipient);
        let estimate = self.gas_provider.estimate_claim_gas_fees(&request).await?;
        let gas_limit = match estimate.gas_limit {
            Some(gas_limit) => gas_limit,
            None => self.client.estimate_claim_gas(message, fee_recipient).await?,
        };

        let Some(nonce) = self.nonce_coordinator.next_nonce().await? else {
            return Ok(false);
        };

        let signed = self
            .client
            .sign_claim_transaction(
                message,
                ClaimOverrides {
                    nonce,
                    gas_limit: Some(gas_limit),
                    fees: estimate.fees,
                },
                fee_recipient,
            )
            .await?;

        let compressed_size = estimate_compressed_size(&signed.raw)
            .map_err(|e| ChainError::Unknown(format!("Failed to compress claim transaction: {}", e)))?;

        message.compressed_transaction_size = Some(compressed_size);
        message.claim_tx_gas_limit = Some(gas_limit);
        message.set_status(MessageStatus::TransactionSizeComputed);
        Ok(true)
    }
}

#[async_trait]
impl<R, C, P> MessageProcessor for L2ClaimMessageTransactionSizeProcessor<R, C, P>
where
    R: MessageRepository + 'static,
    C: MessageServiceClientTrait + 'static,
    P: ChainProviderTrait + 'static,
{
    fn name(&self) -> &'static str {
        "transaction-size"
    }

    async fn process(&self) -> Result<(), ProcessorError> {
        let Some(mut message) = self
            .repository
            .first_n_unprocessed(
                MessageStatus::Anchored,
                self.config.direction,
                1,
                self.config.origin_contract_address,
            )
            .await?
            .into_iter()
            .next()
        else {
            return Ok(());
        };

        match self.compute(&mut message).await {
            Ok(true) => {
                self.repository.update(message.clone()).await?;
                info!(
                    "Message transaction size and gas limit have been computed: messageHash={} compressedTransactionSize={:?} gasLimit={:?}",
                    message.message_hash, message.compressed_transaction_size, message.claim_tx_gas_limit
                );
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(ProcessorError::Store(e)) => Err(ProcessorError::Store(e)),
            Err(e) if !e.mitigation().should_retry => {
                warn!(
                    "Claim of message cannot be executed, status set to NON_EXECUTABLE: messageHash={} error={}",
                    message.message_hash, e
                );
                message.set_status(MessageStatus::NonExecutable);
                self.repository.update(message).await?;
                Ok(())
            }
            Err(e) => {
                error!(
                    "Error while computing claim transaction size: messageHash={} error={}",
                    message.message_hash, e
                );
                Ok(())
            }
        }
    }
}
