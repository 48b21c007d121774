use serde::{Deserialize, Serialize};

use crate::models::ProviderError;

/// EIP-1559 fee parameters for a claim transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasFees {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl GasFees {
    /// Clamps both values to `cap`.
    pub fn capped(self, cap: u128) -> Self {
        Self {
            max_fee_per_gas: self.max_fee_per_gas.min(cap),
            max_priority_fee_per_gas: self.max_priority_fee_per_gas.min(cap),
        }
    }

    /// Raises both values by `percent`, then clamps them to `cap`.
    pub fn bumped(self, percent: u128, cap: u128) -> Self {
        let bump = |price: u128| price.saturating_mul(100 + percent) / 100;
        Self {
            max_fee_per_gas: bump(self.max_fee_per_gas),
            max_priority_fee_per_gas: bump(self.max_priority_fee_per_gas),
        }
        .capped(cap)
    }
}

/// `eth_feeHistory` result, reduced to what fee estimation needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeeHistoryData {
    pub oldest_block: u64,
    pub base_fee_per_gas: Vec<u128>,
    pub reward: Vec<Vec<u128>>,
}

/// Pricing parameters a Linea sequencer writes into the block `extraData`.
///
/// Layout: one version byte followed by three big-endian `u32` values expressed in kwei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockExtraData {
    pub version: u8,
    pub fixed_cost: u128,
    pub variable_cost: u128,
    pub eth_gas_price: u128,
}

const KWEI: u128 = 1_000;
const EXTRA_DATA_LENGTH: usize = 13;

impl BlockExtraData {
    pub fn parse(extra_data: &[u8]) -> Result<Self, ProviderError> {
        if extra_data.len() < EXTRA_DATA_LENGTH {
            return Err(ProviderError::InvalidResponse(format!(
                "block extraData too short: {} bytes",
                extra_data.len()
            )));
        }

        let read_u32 = |offset: usize| -> u128 {
            let mut word = [0u8; 4];
            word.copy_from_slice(&extra_data[offset..offset + 4]);
            u32::from_be_bytes(word) as u128 * KWEI
        };

        Ok(Self {
            version: extra_data[0],
            fixed_cost: read_u32(1),
            variable_cost: read_u32(5),
            eth_gas_price: read_u32(9),
        })
    }
}
