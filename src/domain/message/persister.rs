//! Follows submitted claims until their receipt settles the message.
use std::{sync::Arc, time::Duration};

use alloy::primitives::B256;
use async_trait::async_trait;
use chrono::Utc;
use log::{error, info, warn};

use super::MessageProcessor;
use crate::{
    metrics::{ClaimOutcome, TransactionMetricsUpdater},
    models::{
        Direction, Message, MessageStatus, OnChainMessageStatus, ProcessorError,
        TransactionReceiptData,
    },
    repositories::MessageRepository,
    services::{ChainProviderTrait, MessageServiceClientTrait},
    utils::has_elapsed,
};

#[derive(Debug, Clone)]
pub struct ClaimingPersisterConfig {
    pub direction: Direction,
    pub message_submission_timeout_ms: u64,
    pub max_tx_retries: u32,
    pub price_bump_percent: u64,
    pub receipt_polling_interval_ms: u64,
}

pub struct MessageClaimingPersister<R, C, P>
where
    R: MessageRepository,
    C: MessageServiceClientTrait,
    P: ChainProviderTrait,
{
    repository: Arc<R>,
    client: Arc<C>,
    provider: Arc<P>,
    config: ClaimingPersisterConfig,
    metrics: TransactionMetricsUpdater,
}

impl<R, C, P> MessageClaimingPersister<R, C, P>
where
    R: MessageRepository + 'static,
    C: MessageServiceClientTrait + 'static,
    P: ChainProviderTrait + 'static,
{
    pub fn new(
        repository: Arc<R>,
        client: Arc<C>,
        provider: Arc<P>,
        config: ClaimingPersisterConfig,
    ) -> Self {
        Self {
            repository,
            client,
            provider,
            config,
            metrics: TransactionMetricsUpdater::new(),
        }
    }

    fn is_timed_out(&self, message: &Message) -> bool {
        has_elapsed(
            message.updated_at,
            Utc::now(),
            self.config.message_submission_timeout_ms,
        )
    }

    /// Polls the receipt of `tx_hash` for at most the submission timeout.
    async fn wait_for_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceiptData>, ProcessorError> {
        let polling = async {
            loop {
                if let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? {
                    return Ok::<_, ProcessorError>(receipt);
                }
                tokio::time::sleep(Duration::from_millis(
                    self.config.receipt_polling_interval_ms,
                ))
                .await;
            }
        };

        match tokio::time::timeout(
            Duration::from_millis(self.config.message_submission_timeout_ms),
            polling,
        )
        .await
        {
            Ok(receipt) => receipt.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Handles a claim without receipt past the submission timeout.
    ///
    /// Returns the receipt to settle the message with, if one is available now.
    async fn retry_stuck_claim(
        &self,
        message: &mut Message,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceiptData>, ProcessorError> {
        warn!(
            "Retrying to claim message: messageHash={}",
            message.message_hash
        );

        let status = self
            .client
            .get_message_status(message.message_hash, None)
            .await?;

        if status == OnChainMessageStatus::Claimed {
            let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
            match &receipt {
                Some(receipt) => warn!(
                    "Retried claim message transaction succeed: messageHash={} transactionHash={}",
                    message.message_hash, receipt.transaction_hash
                ),
                None => warn!(
                    "Calling retryTransaction again as message was claimed but transaction receipt is not available yet: messageHash={} transactionHash={}",
                    message.message_hash, tx_hash
                ),
            }
            return Ok(receipt);
        }

        if message.claim_number_of_retry >= self.config.max_tx_retries {
            error!(
                "Max number of retries exceeded. Manual intervention is needed as soon as possible: messageInfo={}",
                message
            );
            return Ok(None);
        }

        warn!(
            "Retry to claim message: numberOfRetries={} messageInfo={}",
            message.claim_number_of_retry + 1,
            message
        );

        let submission = match self
            .client
            .retry_with_higher_fee(tx_hash, self.config.price_bump_percent)
            .await
        {
            Ok(submission) => submission,
            Err(e) => {
                error!(
                    "Transaction retry failed: messageHash={} error={}",
                    message.message_hash, e
                );
                return Ok(None);
            }
        };

        let now = Utc::now();
        message.claim_tx_hash = Some(submission.tx_hash);
        message.claim_tx_gas_limit = Some(submission.gas_limit);
        message.claim_tx_max_fee_per_gas = Some(submission.max_fee_per_gas);
        message.claim_tx_max_priority_fee_per_gas = Some(submission.max_priority_fee_per_gas);
        message.claim_number_of_retry += 1;
        message.claim_last_retried_at = Some(now);
        message.updated_at = now;
        *message = self.repository.update(message.clone()).await?;
        self.metrics.on_claim_retried(message.direction);

        let receipt = self.wait_for_receipt(submission.tx_hash).await?;
        match &receipt {
            Some(receipt) => warn!(
                "Retried claim message transaction succeed: messageHash={} transactionHash={}",
                message.message_hash, receipt.transaction_hash
            ),
            None => error!(
                "Retried claim message transaction is not mined yet: messageHash={} transactionHash={}",
                message.message_hash, submission.tx_hash
            ),
        }
        Ok(receipt)
    }

    async fn settle(
        &self,
        mut message: Message,
        receipt: TransactionReceiptData,
    ) -> Result<(), ProcessorError> {
        if receipt.success {
            message.claim_tx_gas_used = Some(receipt.gas_used);
            message.claim_tx_gas_price = Some(receipt.effective_gas_price);
            message.set_status(MessageStatus::ClaimedSuccess);
            let message = self.repository.update(message).await?;
            self.metrics
                .on_claim_included(&message, &receipt, ClaimOutcome::Success, Utc::now());
            info!(
                "Message has been SUCCESSFULLY claimed: messageHash={} transactionHash={}",
                message.message_hash, receipt.transaction_hash
            );
            return Ok(());
        }

        if self
            .client
            .is_rate_limit_exceeded_error(receipt.transaction_hash)
            .await?
        {
            message.clear_claim_result();
            message.set_status(MessageStatus::Sent);
            let message = self.repository.update(message).await?;
            self.metrics
                .on_claim_included(&message, &receipt, ClaimOutcome::RateLimited, Utc::now());
            info!(
                "Claim reverted on the rate limit, message will be claimed again: messageHash={} transactionHash={}",
                message.message_hash, receipt.transaction_hash
            );
            return Ok(());
        }

        message.set_status(MessageStatus::ClaimedReverted);
        let message = self.repository.update(message).await?;
        self.metrics
            .on_claim_included(&message, &receipt, ClaimOutcome::Reverted, Utc::now());
        warn!(
            "Message claim transaction has been REVERTED: messageHash={} transactionHash={}",
            message.message_hash, receipt.transaction_hash
        );
        Ok(())
    }
}

#[async_trait]
impl<R, C, P> MessageProcessor for MessageClaimingPersister<R, C, P>
where
    R: MessageRepository + 'static,
    C: MessageServiceClientTrait + 'static,
    P: ChainProviderTrait + 'static,
{
    fn name(&self) -> &'static str {
        "persisting"
    }

    async fn process(&self) -> Result<(), ProcessorError> {
        let Some(mut message) = self.repository.first_pending(self.config.direction).await? else {
            return Ok(());
        };

        // A crash between the two writes of a submission leaves the nonce without a hash.
        let Some(tx_hash) = message.claim_tx_hash else {
            if self.is_timed_out(&message) {
                warn!(
                    "Pending message without claim transaction hash, status reset to SENT: messageHash={} nonce={:?}",
                    message.message_hash, message.claim_tx_nonce
                );
                message.set_status(MessageStatus::Sent);
                self.repository.update(message).await?;
            }
            return Ok(());
        };

        let receipt = match self.provider.get_transaction_receipt(tx_hash).await? {
            Some(receipt) => receipt,
            None if self.is_timed_out(&message) => {
                match self.retry_stuck_claim(&mut message, tx_hash).await? {
                    Some(receipt) => receipt,
                    None => return Ok(()),
                }
            }
            None => return Ok(()),
        };

        self.settle(message, receipt).await
    }
}
