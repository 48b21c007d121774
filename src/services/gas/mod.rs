//! Gas fee providers used to price claim transactions.
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::models::{GasFees, ProviderError};

mod compressed_size;
pub use compressed_size::*;

mod ethereum;
pub use ethereum::*;

mod linea;
pub use linea::*;

#[derive(Debug, Clone, PartialEq)]
pub struct GasProviderConfig {
    pub max_fee_per_gas_cap: u128,
    /// Reward percentile requested from `eth_feeHistory`.
    pub gas_estimation_percentile: f64,
    /// Always price claims at the cap.
    pub enforce_max_gas_fee: bool,
}

impl GasProviderConfig {
    fn enforced_fees(&self) -> Option<GasFees> {
        self.enforce_max_gas_fee.then_some(GasFees {
            max_fee_per_gas: self.max_fee_per_gas_cap,
            max_priority_fee_per_gas: self.max_fee_per_gas_cap,
        })
    }

    fn clamp(&self, fees: GasFees) -> GasFees {
        fees.capped(self.max_fee_per_gas_cap)
    }
}

#[async_trait]
#[cfg_attr(test, automock)]
pub trait GasProviderTrait: Send + Sync {
    /// Current fee parameters for a claim transaction.
    async fn get_gas_fees(&self) -> Result<GasFees, ProviderError>;
}
