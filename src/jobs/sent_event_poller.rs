//! Log scanning loop, the only poller that carries a cursor between iterations.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy::primitives::Address;
use log::{error, info, warn};
use tokio::task::JoinHandle;

use super::sleep_while_running;
use crate::{
    domain::MessageSentEventProcessor,
    models::{ProcessorError, StoreError},
    repositories::MessageRepository,
    services::{ChainProviderTrait, MessageSentEventLogClientTrait},
};

/// Block and log index the next scan starts from.
pub type ScanCursor = (u64, u64);

#[derive(Debug, Clone)]
pub struct SentEventPollerConfig {
    pub origin_contract_address: Address,
    pub initial_from_block: Option<u64>,
    pub polling_interval_ms: u64,
}

pub struct MessageSentEventPoller<R, L, P>
where
    R: MessageRepository,
    L: MessageSentEventLogClientTrait,
    P: ChainProviderTrait,
{
    processor: MessageSentEventProcessor<R, L, P>,
    repository: Arc<R>,
    provider: Arc<P>,
    config: SentEventPollerConfig,
}

impl<R, L, P> MessageSentEventPoller<R, L, P>
where
    R: MessageRepository + 'static,
    L: MessageSentEventLogClientTrait + 'static,
    P: ChainProviderTrait + 'static,
{
    pub fn new(
        processor: MessageSentEventProcessor<R, L, P>,
        repository: Arc<R>,
        provider: Arc<P>,
        config: SentEventPollerConfig,
    ) -> Self {
        Self {
            processor,
            repository,
            provider,
            config,
        }
    }

    /// Configured block, else right after the last recorded message, else the chain head.
    pub async fn start_position(&self) -> Result<ScanCursor, ProcessorError> {
        if let Some(block) = self.config.initial_from_block {
            return Ok((block, 0));
        }

        let latest = self
            .repository
            .latest_recorded(
                self.processor.direction(),
                self.config.origin_contract_address,
            )
            .await?;
        if let Some(message) = latest {
            return Ok((message.sent_block_number, message.sent_log_index + 1));
        }

        Ok((self.provider.get_block_number().await?, 0))
    }

    /// Runs one scan and returns where the next one starts.
    ///
    /// A store failure on a given message resumes from that message, any other failure
    /// repeats the same range.
    pub async fn poll_once(&self, cursor: ScanCursor) -> ScanCursor {
        match self.processor.process(cursor.0, cursor.1).await {
            Ok(next) => next,
            Err(ProcessorError::Store(StoreError {
                message: Some(message),
                operation,
                kind,
            })) => {
                warn!(
                    "Message sent event could not be saved, resuming from it: direction={} messageHash={} operation={} error={}",
                    self.processor.direction(),
                    message.message_hash,
                    operation,
                    kind
                );
                (message.sent_block_number, message.sent_log_index)
            }
            Err(e) => {
                error!(
                    "Error processing message sent events: direction={} fromBlock={} error={}",
                    self.processor.direction(),
                    cursor.0,
                    e
                );
                cursor
            }
        }
    }

    pub fn start(self, running: Arc<AtomicBool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let interval = Duration::from_millis(self.config.polling_interval_ms.max(1));
            let direction = self.processor.direction();

            let mut cursor = loop {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                match self.start_position().await {
                    Ok(cursor) => break cursor,
                    Err(e) => {
                        error!(
                            "Failed to resolve the first block to scan: direction={} error={}",
                            direction, e
                        );
                        sleep_while_running(interval, &running).await;
                    }
                }
            };

            info!(
                "Starting message sent event poller: direction={} fromBlock={} fromBlockLogIndex={}",
                direction, cursor.0, cursor.1
            );

            while running.load(Ordering::Relaxed) {
                cursor = self.poll_once(cursor).await;
                sleep_while_running(interval, &running).await;
            }

            info!("Message sent event poller stopped: direction={}", direction);
        })
    }
}
