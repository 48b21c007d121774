//! Fee estimation on Linea, where gas is priced by the compressed size of a transaction.
use std::sync::Arc;

use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use super::{EthereumGasProvider, GasProviderConfig, GasProviderTrait};
use crate::{
    constants::{LINEA_FEE_MARGIN_DENOMINATOR, LINEA_FEE_MARGIN_NUMERATOR},
    models::{BlockExtraData, GasFees, ProviderError},
    services::ChainProviderTrait,
};

/// Fee parameters and, when the node computed one, the gas limit of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimGasEstimate {
    pub gas_limit: Option<u64>,
    pub fees: GasFees,
}

pub struct LineaGasProvider<P: ChainProviderTrait> {
    provider: Arc<P>,
    fee_history: EthereumGasProvider<P>,
    config: GasProviderConfig,
    enable_linea_estimate_gas: bool,
}

impl<P: ChainProviderTrait + 'static> LineaGasProvider<P> {
    pub fn new(provider: Arc<P>, config: GasProviderConfig, enable_linea_estimate_gas: bool) -> Self {
        Self {
            fee_history: EthereumGasProvider::new(provider.clone(), config.clone()),
            provider,
            config,
            enable_linea_estimate_gas,
        }
    }

    async fn linea_estimate(&self, request: &TransactionRequest) -> Result<ClaimGasEstimate, ProviderError> {
        let estimate = self.provider.linea_estimate_gas(request).await?;
        let fees = GasFees {
            max_fee_per_gas: estimate
                .base_fee_per_gas
                .saturating_add(estimate.priority_fee_per_gas),
            max_priority_fee_per_gas: estimate.priority_fee_per_gas,
        };
        Ok(ClaimGasEstimate {
            gas_limit: Some(estimate.gas_limit),
            fees: self.config.clamp(fees),
        })
    }

    /// Fees of a claim whose size is not known yet.
    pub async fn estimate_claim_gas_fees(
        &self,
        request: &TransactionRequest,
    ) -> Result<ClaimGasEstimate, ProviderError> {
        if let Some(fees) = self.config.enforced_fees() {
            return Ok(ClaimGasEstimate {
                gas_limit: None,
                fees,
            });
        }
        if self.enable_linea_estimate_gas {
            return self.linea_estimate(request).await;
        }
        Ok(ClaimGasEstimate {
            gas_limit: None,
            fees: self.fee_history.get_gas_fees().await?,
        })
    }

    /// Fees of a claim of known compressed size.
    ///
    /// Uses `linea_estimateGas` when enabled, the pricing published in the latest block
    /// `extraData` otherwise.
    pub async fn get_claim_gas_fees(
        &self,
        request: &TransactionRequest,
        compressed_transaction_size: u64,
        gas_limit: u64,
    ) -> Result<GasFees, ProviderError> {
        if let Some(fees) = self.config.enforced_fees() {
            return Ok(fees);
        }
        if self.enable_linea_estimate_gas {
            return Ok(self.linea_estimate(request).await?.fees);
        }

        let extra_data = self.provider.get_block_extra_data().await?;
        let pricing = BlockExtraData::parse(&extra_data)?;
        let fee = compressed_size_fee(&pricing, compressed_transaction_size, gas_limit);

        Ok(self.config.clamp(GasFees {
            max_fee_per_gas: fee,
            max_priority_fee_per_gas: fee,
        }))
    }
}

/// `6/5 * (variableCost * compressedSize / gasLimit + fixedCost)`
pub fn compressed_size_fee(pricing: &BlockExtraData, compressed_size: u64, gas_limit: u64) -> u128 {
    let variable = if gas_limit == 0 {
        0
    } else {
        pricing
            .variable_cost
            .saturating_mul(u128::from(compressed_size))
            / u128::from(gas_limit)
    };
    variable
        .saturating_add(pricing.fixed_cost)
        .saturating_mul(LINEA_FEE_MARGIN_NUMERATOR)
        / LINEA_FEE_MARGIN_DENOMINATOR
}

#[async_trait]
impl<P: ChainProviderTrait + 'static> GasProviderTrait for LineaGasProvider<P> {
    async fn get_gas_fees(&self) -> Result<GasFees, ProviderError> {
        self.fee_history.get_gas_fees().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineaGasEstimate;
    use crate::services::MockChainProviderTrait;
    use alloy::primitives::Bytes;
    use futures::FutureExt;

    fn config() -> GasProviderConfig {
        GasProviderConfig {
            max_fee_per_gas_cap: 100_000_000_000,
            gas_estimation_percentile: 20.0,
            enforce_max_gas_fee: false,
        }
    }

    fn extra_data() -> Bytes {
        let mut data = vec![1u8];
        data.extend_from_slice(&1_000u32.to_be_bytes()); // fixed 1_000_000 wei
        data.extend_from_slice(&2_000u32.to_be_bytes()); // variable 2_000_000 wei
        data.extend_from_slice(&3u32.to_be_bytes());
        data.into()
    }

    #[test]
    fn test_compressed_size_fee() {
        let pricing = BlockExtraData::parse(&extra_data()).unwrap();
        // 6/5 * (2_000_000 * 500 / 100_000 + 1_000_000) = 1_212_000
        assert_eq!(compressed_size_fee(&pricing, 500, 100_000), 1_212_000);
        assert_eq!(compressed_size_fee(&pricing, 500, 0), 1_200_000);
    }

    #[tokio::test]
    async fn test_claim_fees_from_extra_data() {
        let mut provider = MockChainProviderTrait::new();
        provider
            .expect_get_block_extra_data()
            .times(1)
            .returning(|| async { Ok(extra_data()) }.boxed());

        let gas = LineaGasProvider::new(Arc::new(provider), config(), false);
        let fees = gas
            .get_claim_gas_fees(&TransactionRequest::default(), 500, 100_000)
            .await
            .unwrap();
        assert_eq!(fees.max_fee_per_gas, 1_212_000);
        assert_eq!(fees.max_priority_fee_per_gas, 1_212_000);
    }

    #[tokio::test]
    async fn test_linea_estimate_gas_supplies_limit_and_fees() {
        let mut provider = MockChainProviderTrait::new();
        provider.expect_linea_estimate_gas().times(1).returning(|_| {
            async {
                Ok(LineaGasEstimate {
                    gas_limit: 70_000,
                    base_fee_per_gas: 7,
                    priority_fee_per_gas: 1_000,
                })
            }
            .boxed()
        });

        let gas = LineaGasProvider::new(Arc::new(provider), config(), true);
        let estimate = gas
            .estimate_claim_gas_fees(&TransactionRequest::default())
            .await
            .unwrap();
        assert_eq!(estimate.gas_limit, Some(70_000));
        assert_eq!(
            estimate.fees,
            GasFees {
                max_fee_per_gas: 1_007,
                max_priority_fee_per_gas: 1_000
            }
        );
    }

    #[tokio::test]
    async fn test_estimate_without_linea_method_uses_fee_history() {
        let mut provider = MockChainProviderTrait::new();
        provider
            .expect_get_block_number()
            .returning(|| async { Ok(5) }.boxed());
        provider.expect_get_fee_history().returning(|_, _| {
            async {
                Ok(crate::models::FeeHistoryData {
                    oldest_block: 1,
                    base_fee_per_gas: vec![10],
                    reward: vec![vec![1]],
                })
            }
            .boxed()
        });

        let gas = LineaGasProvider::new(Arc::new(provider), config(), false);
        let estimate = gas
            .estimate_claim_gas_fees(&TransactionRequest::default())
            .await
            .unwrap();
        assert_eq!(estimate.gas_limit, None);
        assert_eq!(estimate.fees.max_fee_per_gas, 21);
    }
}
