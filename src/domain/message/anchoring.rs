//! Detects when sent messages become claimable on the destination chain.
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use log::{error, info, warn};

use super::MessageProcessor;
use crate::{
    models::{Direction, MessageStatus, OnChainMessageStatus, ProcessorError},
    repositories::MessageRepository,
    services::{ChainProviderTrait, MessageServiceClientTrait},
};

#[derive(Debug, Clone)]
pub struct AnchoringProcessorConfig {
    pub direction: Direction,
    pub origin_contract_address: Address,
    pub max_fetch_messages_from_db: usize,
}

pub struct MessageAnchoringProcessor<R, C, P>
where
    R: MessageRepository,
    C: MessageServiceClientTrait,
    P: ChainProviderTrait,
{
    repository: Arc<R>,
    client: Arc<C>,
    provider: Arc<P>,
    config: AnchoringProcessorConfig,
}

impl<R, C, P> MessageAnchoringProcessor<R, C, P>
where
    R: MessageRepository,
    C: MessageServiceClientTrait,
    P: ChainProviderTrait,
{
    pub fn new(
        repository: Arc<R>,
        client: Arc<C>,
        provider: Arc<P>,
        config: AnchoringProcessorConfig,
    ) -> Self {
        Self {
            repository,
            client,
            provider,
            config,
        }
    }
}

#[async_trait]
impl<R, C, P> MessageProcessor for MessageAnchoringProcessor<R, C, P>
where
    R: MessageRepository + 'static,
    C: MessageServiceClientTrait + 'static,
    P: ChainProviderTrait + 'static,
{
    fn name(&self) -> &'static str {
        "anchoring"
    }

    async fn process(&self) -> Result<(), ProcessorError> {
        let messages = self
            .repository
            .first_n_unprocessed(
                MessageStatus::Sent,
                self.config.direction,
                self.config.max_fetch_messages_from_db,
                self.config.origin_contract_address,
            )
            .await?;

        if messages.is_empty() {
            return Ok(());
        }

        if messages.len() >= self.config.max_fetch_messages_from_db {
            warn!(
                "Limit of messages sent to listen reached: direction={} limit={}",
                self.config.direction, self.config.max_fetch_messages_from_db
            );
        }

        let block_number = self.provider.get_block_number().await?;
        let mut updated = Vec::new();

        for mut message in messages {
            let status = match self
                .client
                .get_message_status(message.message_hash, Some(block_number))
                .await
            {
                Ok(status) => status,
                Err(e) => {
                    error!(
                        "Failed to read message status: messageHash={} error={}",
                        message.message_hash, e
                    );
                    continue;
                }
            };

            match status {
                OnChainMessageStatus::Claimable => {
                    info!(
                        "Anchored message found: messageHash={} blockNumber={}",
                        message.message_hash, block_number
                    );
                    message.set_status(MessageStatus::Anchored);
                    updated.push(message);
                }
                OnChainMessageStatus::Claimed => {
                    info!(
                        "Message already claimed: messageHash={}",
                        message.message_hash
                    );
                    message.set_status(MessageStatus::ClaimedSuccess);
                    updated.push(message);
                }
                OnChainMessageStatus::Unknown => {}
            }
        }

        if !updated.is_empty() {
            self.repository.update_many(updated).await?;
        }
        Ok(())
    }
}
