//! Fee estimation from `eth_feeHistory`.
use std::sync::Arc;

use alloy::primitives::U256;
use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;

use super::{GasProviderConfig, GasProviderTrait};
use crate::{
    constants::FEE_HISTORY_BLOCK_COUNT,
    models::{FeeHistoryData, GasFees, ProviderError},
    services::ChainProviderTrait,
};

/// Prices claims from the recent base fees and the configured reward percentile.
///
/// Results are cached for the block they were computed at.
pub struct EthereumGasProvider<P: ChainProviderTrait> {
    provider: Arc<P>,
    config: GasProviderConfig,
    cache: Mutex<Option<(u64, GasFees)>>,
}

impl<P: ChainProviderTrait> EthereumGasProvider<P> {
    pub fn new(provider: Arc<P>, config: GasProviderConfig) -> Self {
        Self {
            provider,
            config,
            cache: Mutex::new(None),
        }
    }

    /// `maxFeePerGas = 2 * lastBaseFee + meanReward`
    fn fees_from_history(history: &FeeHistoryData) -> Result<GasFees, ProviderError> {
        let base_fee = *history
            .base_fee_per_gas
            .last()
            .ok_or_else(|| ProviderError::InvalidResponse("Empty fee history".to_string()))?;

        let rewards: Vec<u128> = history
            .reward
            .iter()
            .filter_map(|block| block.first().copied())
            .collect();
        // Summed as U256, rewards come straight from the node.
        let priority_fee = if rewards.is_empty() {
            0
        } else {
            let total = rewards
                .iter()
                .fold(U256::ZERO, |acc, reward| acc + U256::from(*reward));
            (total / U256::from(rewards.len())).saturating_to::<u128>()
        };

        Ok(GasFees {
            max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(priority_fee),
            max_priority_fee_per_gas: priority_fee,
        })
    }
}

#[async_trait]
impl<P: ChainProviderTrait + 'static> GasProviderTrait for EthereumGasProvider<P> {
    async fn get_gas_fees(&self) -> Result<GasFees, ProviderError> {
        if let Some(fees) = self.config.enforced_fees() {
            return Ok(fees);
        }

        let block_number = self.provider.get_block_number().await?;
        let mut cache = self.cache.lock().await;
        if let Some((cached_block, fees)) = *cache {
            if cached_block == block_number {
                return Ok(fees);
            }
        }

        let history = self
            .provider
            .get_fee_history(
                FEE_HISTORY_BLOCK_COUNT,
                vec![self.config.gas_estimation_percentile],
            )
            .await?;
        let fees = self.config.clamp(Self::fees_from_history(&history)?);

        debug!(
            "Gas fees computed: blockNumber={} maxFeePerGas={} maxPriorityFeePerGas={}",
            block_number, fees.max_fee_per_gas, fees.max_priority_fee_per_gas
        );

        *cache = Some((block_number, fees));
        Ok(fees)
    }
}
