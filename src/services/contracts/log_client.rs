//! Reads `MessageSent` events from the origin chain.
use std::sync::Arc;

use alloy::{
    primitives::Address,
    rpc::types::{Filter, Log},
    sol_types::SolEvent,
};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::abi::IMessageService::MessageSent;
use crate::{
    models::{ChainError, MessageSentEvent, MessageSentEventFilter},
    services::ChainProviderTrait,
};

#[async_trait]
#[cfg_attr(test, automock)]
pub trait MessageSentEventLogClientTrait: Send + Sync {
    /// Returns the events of the filter's block range, in chain order.
    async fn get_message_sent_events(
        &self,
        filter: MessageSentEventFilter,
    ) -> Result<Vec<MessageSentEvent>, ChainError>;
}

pub fn decode_message_sent_log(log: &Log) -> Result<MessageSentEvent, ChainError> {
    let decoded = MessageSent::decode_log(&log.inner, true)
        .map_err(|e| ChainError::InvalidResponse(format!("Invalid MessageSent log: {}", e)))?;

    let (Some(block_number), Some(log_index), Some(transaction_hash)) =
        (log.block_number, log.log_index, log.transaction_hash)
    else {
        return Err(ChainError::InvalidResponse(
            "MessageSent log without block position".to_string(),
        ));
    };

    Ok(MessageSentEvent {
        message_sender: decoded.data._from,
        destination: decoded.data._to,
        fee: decoded.data._fee,
        value: decoded.data._value,
        message_nonce: decoded.data._nonce,
        calldata: decoded.data._calldata.clone(),
        message_hash: decoded.data._messageHash,
        contract_address: log.inner.address,
        block_number,
        log_index,
        transaction_hash,
    })
}

pub struct MessageSentEventLogClient<P: ChainProviderTrait> {
    provider: Arc<P>,
    contract_address: Address,
}

impl<P: ChainProviderTrait> MessageSentEventLogClient<P> {
    pub fn new(provider: Arc<P>, contract_address: Address) -> Self {
        Self {
            provider,
            contract_address,
        }
    }
}

#[async_trait]
impl<P: ChainProviderTrait + 'static> MessageSentEventLogClientTrait
    for MessageSentEventLogClient<P>
{
    async fn get_message_sent_events(
        &self,
        filter: MessageSentEventFilter,
    ) -> Result<Vec<MessageSentEvent>, ChainError> {
        let mut log_filter = Filter::new()
            .address(self.contract_address)
            .event_signature(MessageSent::SIGNATURE_HASH)
            .from_block(filter.from_block)
            .to_block(filter.to_block);
        if let Some(sender) = filter.message_sender {
            log_filter = log_filter.topic1(sender.into_word());
        }
        if let Some(destination) = filter.destination {
            log_filter = log_filter.topic2(destination.into_word());
        }

        let logs = self.provider.get_logs(&log_filter).await?;

        logs.iter()
            .filter(|log| {
                !(log.block_number == Some(filter.from_block)
                    && log.log_index.unwrap_or_default() < filter.from_block_log_index)
            })
            .map(decode_message_sent_log)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::ProviderError,
        services::MockChainProviderTrait,
        utils::mocks::mockutils::{
            mock_message_hash, TEST_CONTRACT_ADDRESS, TEST_DESTINATION, TEST_SENDER,
        },
    };
    use alloy::primitives::{keccak256, Bytes, LogData, U256};
    use futures::FutureExt;

    fn sent_log(block_number: u64, log_index: u64) -> Log {
        let event = MessageSent {
            _from: TEST_SENDER,
            _to: TEST_DESTINATION,
            _fee: U256::from(10),
            _value: U256::from(20),
            _nonce: U256::from(block_number),
            _calldata: Bytes::new(),
            _messageHash: mock_message_hash(block_number, log_index),
        };
        let data: LogData = event.encode_log_data();
        Log {
            inner: alloy::primitives::Log {
                address: TEST_CONTRACT_ADDRESS,
                data,
            },
            block_number: Some(block_number),
            log_index: Some(log_index),
            transaction_hash: Some(keccak256(block_number.to_be_bytes())),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_skips_logs_before_start_index() {
        let mut provider = MockChainProviderTrait::new();
        provider.expect_get_logs().times(1).returning(|_| {
            async { Ok(vec![sent_log(10, 0), sent_log(10, 1), sent_log(10, 2), sent_log(11, 0)]) }
                .boxed()
        });

        let client = MessageSentEventLogClient::new(Arc::new(provider), TEST_CONTRACT_ADDRESS);
        let events = client
            .get_message_sent_events(MessageSentEventFilter {
                from_block: 10,
                to_block: 11,
                from_block_log_index: 2,
                ..Default::default()
            })
            .await
            .unwrap();

        let positions: Vec<_> = events.iter().map(|e| (e.block_number, e.log_index)).collect();
        assert_eq!(positions, vec![(10, 2), (11, 0)]);
        assert_eq!(events[0].message_hash, mock_message_hash(10, 2));
        assert_eq!(events[0].message_sender, TEST_SENDER);
        assert_eq!(events[0].contract_address, TEST_CONTRACT_ADDRESS);
    }

    #[tokio::test]
    async fn test_address_filters_become_topics() {
        let mut provider = MockChainProviderTrait::new();
        provider
            .expect_get_logs()
            .withf(|filter| {
                filter.topics[1].matches(&TEST_SENDER.into_word())
                    && filter.topics[2].matches(&TEST_DESTINATION.into_word())
                    && !filter.topics[2].matches(&TEST_SENDER.into_word())
            })
            .times(1)
            .returning(|_| async { Ok(vec![]) }.boxed());

        let client = MessageSentEventLogClient::new(Arc::new(provider), TEST_CONTRACT_ADDRESS);
        let events = client
            .get_message_sent_events(MessageSentEventFilter {
                from_block: 0,
                to_block: 5,
                from_block_log_index: 0,
                message_sender: Some(TEST_SENDER),
                destination: Some(TEST_DESTINATION),
            })
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_is_classified() {
        let mut provider = MockChainProviderTrait::new();
        provider
            .expect_get_logs()
            .returning(|_| async { Err(ProviderError::Timeout) }.boxed());

        let client = MessageSentEventLogClient::new(Arc::new(provider), TEST_CONTRACT_ADDRESS);
        let err = client
            .get_message_sent_events(MessageSentEventFilter::default())
            .await
            .unwrap_err();
        assert!(err.mitigation().should_retry);
    }

    #[test]
    fn test_decode_rejects_pending_log() {
        let mut log = sent_log(1, 0);
        log.block_number = None;
        assert!(matches!(
            decode_message_sent_log(&log),
            Err(ChainError::InvalidResponse(_))
        ));
    }
}
