use std::sync::Arc;

use alloy::primitives::Address;
use log::error;

use crate::{
    models::{Direction, ProcessorError},
    repositories::MessageRepository,
    services::ChainProviderTrait,
};

/// Picks the nonce of the next claim transaction of one direction.
///
/// The nonce is the larger of the signer's pending transaction count and the last nonce
/// recorded in the store plus one. When the store runs too far ahead of the chain, claims
/// stop until the gap closes.
pub struct NonceCoordinator<R, P>
where
    R: MessageRepository,
    P: ChainProviderTrait,
{
    repository: Arc<R>,
    provider: Arc<P>,
    signer_address: Address,
    direction: Direction,
    max_nonce_diff: u64,
}

impl<R, P> NonceCoordinator<R, P>
where
    R: MessageRepository,
    P: ChainProviderTrait,
{
    pub fn new(
        repository: Arc<R>,
        provider: Arc<P>,
        signer_address: Address,
        direction: Direction,
        max_nonce_diff: u64,
    ) -> Self {
        Self {
            repository,
            provider,
            signer_address,
            direction,
            max_nonce_diff,
        }
    }

    /// Returns `None` when the recorded nonce is more than `max_nonce_diff` ahead of the chain.
    pub async fn next_nonce(&self) -> Result<Option<u64>, ProcessorError> {
        let last_recorded = self.repository.last_claim_tx_nonce(self.direction).await?;
        let on_chain = self
            .provider
            .get_transaction_count(self.signer_address, true)
            .await?;

        let Some(last_recorded) = last_recorded else {
            return Ok(Some(on_chain));
        };

        if last_recorded.saturating_sub(on_chain) > self.max_nonce_diff {
            error!(
                "Last recorded nonce in db is higher than the latest nonce from blockchain and exceeds the diff limit, paused the claim message process now: direction={} lastRecordedNonce={} onChainNonce={} maxAllowedNonceDiff={}",
                self.direction, last_recorded, on_chain, self.max_nonce_diff
            );
            return Ok(None);
        }

        Ok(Some(on_chain.max(last_recorded + 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::ProviderError, repositories::MockMessageRepository,
        services::MockChainProviderTrait, utils::mocks::mockutils::TEST_SIGNER,
    };
    use futures::FutureExt;

    fn coordinator(last_recorded: Option<u64>, on_chain: u64) -> NonceCoordinator<MockMessageRepository, MockChainProviderTrait> {
        let mut repository = MockMessageRepository::new();
        repository
            .expect_last_claim_tx_nonce()
            .returning(move |_| Ok(last_recorded));
        let mut provider = MockChainProviderTrait::new();
        provider
            .expect_get_transaction_count()
            .withf(|address, pending| *address == TEST_SIGNER && *pending)
            .returning(move |_, _| async move { Ok(on_chain) }.boxed());

        NonceCoordinator::new(Arc::new(repository), Arc::new(provider), TEST_SIGNER, Direction::L1ToL2, 5)
    }

    #[tokio::test]
    async fn test_next_nonce() {
        assert_eq!(coordinator(None, 4).next_nonce().await.unwrap(), Some(4));
        assert_eq!(coordinator(Some(9), 4).next_nonce().await.unwrap(), Some(10));
        assert_eq!(coordinator(Some(2), 4).next_nonce().await.unwrap(), Some(4));
        assert_eq!(coordinator(Some(3), 4).next_nonce().await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_nonce_gap_pauses_claiming() {
        assert_eq!(coordinator(Some(10), 4).next_nonce().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_provider_failure_aborts() {
        let mut repository = MockMessageRepository::new();
        repository.expect_last_claim_tx_nonce().returning(|_| Ok(None));
        let mut provider = MockChainProviderTrait::new();
        provider
            .expect_get_transaction_count()
            .returning(|_, _| async { Err(ProviderError::Timeout) }.boxed());

        let coordinator =
            NonceCoordinator::new(Arc::new(repository), Arc::new(provider), TEST_SIGNER, Direction::L2ToL1, 5);
        assert!(matches!(
            coordinator.next_nonce().await,
            Err(ProcessorError::Chain(_))
        ));
    }
}
