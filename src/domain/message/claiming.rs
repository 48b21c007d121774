//! Submits claim transactions for messages that passed validation.
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chrono::Utc;
use log::{error, info, warn};

use super::{MessageProcessor, NonceCoordinator};
use crate::{
    constants::PROFIT_MARGIN_PRECISION,
    models::{
        ClaimOverrides, Direction, GasFees, Message, MessageStatus, OnChainMessageStatus,
        ProcessorError,
    },
    repositories::{ClaimableQuery, MessageRepository},
    services::{
        ChainProviderTrait, GasProviderTrait, MessageServiceClientTrait,
        TransactionValidationServiceTrait,
    },
};

#[derive(Debug, Clone)]
pub struct ClaimingProcessorConfig {
    pub direction: Direction,
    pub origin_contract_address: Address,
    pub fee_recipient: Address,
    /// Eligible statuses, in priority order.
    pub claimable_statuses: Vec<MessageStatus>,
    pub max_number_of_retries: u32,
    pub retry_delay_in_seconds: u64,
    pub profit_margin: f64,
    /// Only revisit underpriced messages once their threshold beats the current gas price.
    pub use_gas_price_threshold: bool,
}

pub struct MessageClaimingProcessor<R, C, V, G, P>
where
    R: MessageRepository,
    C: MessageServiceClientTrait,
    V: TransactionValidationServiceTrait,
    G: GasProviderTrait,
    P: ChainProviderTrait,
{
    repository: Arc<R>,
    client: Arc<C>,
    validation: Arc<V>,
    gas_provider: Arc<G>,
    nonce_coordinator: Arc<NonceCoordinator<R, P>>,
    config: ClaimingProcessorConfig,
}

impl<R, C, V, G, P> MessageClaimingProcessor<R, C, V, G, P>
where
    R: MessageRepository + 'static,
    C: MessageServiceClientTrait + 'static,
    V: TransactionValidationServiceTrait + 'static,
    G: GasProviderTrait + 'static,
    P: ChainProviderTrait + 'static,
{
    pub fn new(
        repository: Arc<R>,
        client: Arc<C>,
        validation: Arc<V>,
        gas_provider: Arc<G>,
        nonce_coordinator: Arc<NonceCoordinator<R, P>>,
        config: ClaimingProcessorConfig,
    ) -> Self {
        Self {
            repository,
            client,
            validation,
            gas_provider,
            nonce_coordinator,
            config,
        }
    }

    async fn claimable_query(&self) -> Result<ClaimableQuery, ProcessorError> {
        let min_gas_threshold = if self.config.use_gas_price_threshold {
            let fees = self.gas_provider.get_gas_fees().await?;
            let margin =
                (self.config.profit_margin * PROFIT_MARGIN_PRECISION as f64).round() as u128;
            Some(
                U256::from(fees.max_fee_per_gas).saturating_mul(U256::from(margin))
                    / U256::from(PROFIT_MARGIN_PRECISION),
            )
        } else {
            None
        };

        Ok(ClaimableQuery {
            direction: self.config.direction,
            contract_address: self.config.origin_contract_address,
            statuses: self.config.claimable_statuses.clone(),
            max_retry: self.config.max_number_of_retries,
            retry_delay_secs: self.config.retry_delay_in_seconds,
            min_gas_threshold,
        })
    }

    async fn save_status(
        &self,
        message: &mut Message,
        status: MessageStatus,
    ) -> Result<(), ProcessorError> {
        message.set_status(status);
        *message = self.repository.update(message.clone()).await?;
        Ok(())
    }

    async fn claim(&self, message: &mut Message, nonce: u64) -> Result<(), ProcessorError> {
        let on_chain = self
            .client
            .get_message_status(message.message_hash, None)
            .await?;
        if on_chain == OnChainMessageStatus::Claimed {
            info!(
                "Found already claimed message: messageHash={}",
                message.message_hash
            );
            self.save_status(message, MessageStatus::ClaimedSuccess)
                .await?;
            return Ok(());
        }

        let fee_recipient = self.config.fee_recipient;
        let validation = self.validation.evaluate(message, fee_recipient).await?;

        if validation.has_zero_fee && !validation.is_for_sponsorship {
            warn!(
                "Found message with zero fee. This message will not be processed: messageHash={}",
                message.message_hash
            );
            self.save_status(message, MessageStatus::ZeroFee).await?;
            return Ok(());
        }

        let Some(gas_limit) = validation.estimated_gas_limit else {
            warn!(
                "Estimated gas limit is higher than the max allowed gas limit for this message: messageHash={}",
                message.message_hash
            );
            self.save_status(message, MessageStatus::NonExecutable)
                .await?;
            return Ok(());
        };

        message.claim_gas_estimation_threshold = Some(validation.threshold);
        message.updated_at = Utc::now();
        *message = self.repository.update(message.clone()).await?;

        if validation.is_under_priced && !validation.is_for_sponsorship {
            info!(
                "Fee underpriced found in this message: messageHash={} fee={} threshold={}",
                message.message_hash, message.fee, validation.threshold
            );
            message.claim_number_of_retry += 1;
            message.claim_last_retried_at = Some(Utc::now());
            self.save_status(message, MessageStatus::FeeUnderpriced)
                .await?;
            return Ok(());
        }

        if validation.is_rate_limit_exceeded {
            warn!(
                "Rate limit exceeded for this message. It will be reprocessed later: messageHash={}",
                message.message_hash
            );
            return Ok(());
        }

        message.is_for_sponsorship = validation.is_for_sponsorship;

        let overrides = ClaimOverrides {
            nonce,
            gas_limit: Some(gas_limit),
            fees: GasFees {
                max_fee_per_gas: validation.max_fee_per_gas,
                max_priority_fee_per_gas: validation.max_priority_fee_per_gas,
            },
        };
        let client = self.client.clone();
        let claimed = message.clone();
        let (saved, submission) = self
            .repository
            .update_with_claim_submission(message.clone(), nonce, async move {
                client.claim(&claimed, overrides, fee_recipient).await
            })
            .await?;

        info!(
            "Message has been claimed: messageHash={} transactionHash={} nonce={} isForSponsorship={}",
            saved.message_hash, submission.tx_hash, submission.nonce, saved.is_for_sponsorship
        );
        *message = saved;
        Ok(())
    }
}

#[async_trait]
impl<R, C, V, G, P> MessageProcessor for MessageClaimingProcessor<R, C, V, G, P>
where
    R: MessageRepository + 'static,
    C: MessageServiceClientTrait + 'static,
    V: TransactionValidationServiceTrait + 'static,
    G: GasProviderTrait + 'static,
    P: ChainProviderTrait + 'static,
{
    fn name(&self) -> &'static str {
        "claiming"
    }

    async fn process(&self) -> Result<(), ProcessorError> {
        let Some(nonce) = self.nonce_coordinator.next_nonce().await? else {
            return Ok(());
        };

        let query = self.claimable_query().await?;
        let Some(mut message) = self.repository.next_claimable(query).await? else {
            return Ok(());
        };

        match self.claim(&mut message, nonce).await {
            Ok(()) => Ok(()),
            Err(ProcessorError::Store(e)) => Err(ProcessorError::Store(e)),
            Err(e) if !e.mitigation().should_retry => {
                warn!(
                    "Claim of message cannot be executed, status set to NON_EXECUTABLE: messageHash={} error={}",
                    message.message_hash, e
                );
                self.save_status(&mut message, MessageStatus::NonExecutable)
                    .await
            }
            Err(e) => {
                error!(
                    "Error while claiming message, it will be retried: messageHash={} error={}",
                    message.message_hash, e
                );
                Ok(())
            }
        }
    }
}
