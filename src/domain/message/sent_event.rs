//! Discovers messages sent on the origin chain and records them.
use std::sync::Arc;

use alloy::primitives::Address;
use log::{info, warn};

use crate::{
    models::{
        Direction, Message, MessageSentEvent, MessageSentEventFilter, MessageStatus,
        ProcessorError,
    },
    repositories::MessageRepository,
    services::{CalldataFilter, ChainProviderTrait, MessageSentEventLogClientTrait},
};

#[derive(Debug, Clone)]
pub struct SentEventProcessorConfig {
    pub direction: Direction,
    pub max_blocks_to_fetch_logs: u64,
    pub block_confirmation: u64,
    pub is_eoa_enabled: bool,
    pub is_calldata_enabled: bool,
    pub message_sender_filter: Option<Address>,
    pub destination_filter: Option<Address>,
    pub calldata_filter: Option<CalldataFilter>,
}

pub struct MessageSentEventProcessor<R, L, P>
where
    R: MessageRepository,
    L: MessageSentEventLogClientTrait,
    P: ChainProviderTrait,
{
    repository: Arc<R>,
    log_client: Arc<L>,
    provider: Arc<P>,
    config: SentEventProcessorConfig,
}

impl<R, L, P> MessageSentEventProcessor<R, L, P>
where
    R: MessageRepository,
    L: MessageSentEventLogClientTrait,
    P: ChainProviderTrait,
{
    pub fn new(
        repository: Arc<R>,
        log_client: Arc<L>,
        provider: Arc<P>,
        config: SentEventProcessorConfig,
    ) -> Self {
        Self {
            repository,
            log_client,
            provider,
            config,
        }
    }

    pub fn direction(&self) -> Direction {
        self.config.direction
    }

    /// Whether the event should be relayed, given the EOA/calldata switches and the calldata filter.
    pub fn should_process(&self, event: &MessageSentEvent) -> bool {
        if event.calldata.is_empty() {
            if !self.config.is_eoa_enabled {
                info!(
                    "Message has been excluded because target address is not an EOA or EOA relaying is disabled: messageHash={}",
                    event.message_hash
                );
            }
            return self.config.is_eoa_enabled;
        }

        if !self.config.is_calldata_enabled {
            info!(
                "Message has been excluded because calldata relaying is disabled: messageHash={}",
                event.message_hash
            );
            return false;
        }

        let Some(filter) = &self.config.calldata_filter else {
            return true;
        };

        match filter.matches(event) {
            Ok(true) => true,
            Ok(false) => {
                info!(
                    "Message has been excluded because it does not match the calldata filter: messageHash={} criteria={}",
                    event.message_hash,
                    filter.expression()
                );
                false
            }
            Err(e) => {
                warn!(
                    "Calldata filter could not be evaluated, message excluded: messageHash={} error={}",
                    event.message_hash, e
                );
                false
            }
        }
    }

    /// Scans one block range starting at `(from_block, from_block_log_index)` and returns the
    /// position the next scan starts from.
    pub async fn process(
        &self,
        from_block: u64,
        from_block_log_index: u64,
    ) -> Result<(u64, u64), ProcessorError> {
        let latest_block = self
            .provider
            .get_block_number()
            .await?
            .saturating_sub(self.config.block_confirmation);
        let to_block = latest_block.min(from_block.saturating_add(self.config.max_blocks_to_fetch_logs));
        let from_block = from_block.min(to_block);

        info!(
            "Getting events: direction={} fromBlock={} fromBlockLogIndex={} toBlock={}",
            self.config.direction, from_block, from_block_log_index, to_block
        );

        let events = self
            .log_client
            .get_message_sent_events(MessageSentEventFilter {
                from_block,
                to_block,
                from_block_log_index,
                message_sender: self.config.message_sender_filter,
                destination: self.config.destination_filter,
            })
            .await?;

        info!(
            "Number of fetched MessageSent events: direction={} count={}",
            self.config.direction,
            events.len()
        );

        for event in &events {
            let status = if self.should_process(event) {
                MessageStatus::Sent
            } else {
                MessageStatus::Excluded
            };
            let message = Message::from_event(event, self.config.direction, status);

            let inserted = self
                .repository
                .insert_if_absent(message.clone())
                .await
                .map_err(|e| e.with_message(&message))?;

            if inserted {
                info!(
                    "Message sent event recorded: messageHash={} status={} blockNumber={}",
                    message.message_hash, status, message.sent_block_number
                );
            }
        }

        Ok((to_block + 1, 0))
    }
}
