//! Economic and protocol checks run before a message is claimed.
//!
//! Two implementations share one contract: Ethereum prices a claim with a flat gas price
//! taken from the fee history, Linea prices it by the compressed size of the transaction.
//! The variant is chosen once per pipeline at composition time.
use alloy::primitives::{Address, U256};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::{
    constants::PROFIT_MARGIN_PRECISION,
    models::{GasFees, Message, ValidationError},
    services::{ChainProviderTrait, GasProviderTrait, MessageServiceClientTrait},
};

mod ethereum;
pub use ethereum::*;

mod linea;
pub use linea::*;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    pub profit_margin: f64,
    pub max_claim_gas_limit: u64,
    pub is_postman_sponsorship_enabled: bool,
    pub max_postman_sponsor_gas_limit: u64,
}

/// Outcome of [`TransactionValidationServiceTrait::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimValidation {
    pub has_zero_fee: bool,
    pub is_under_priced: bool,
    pub is_rate_limit_exceeded: bool,
    pub is_for_sponsorship: bool,
    /// `None` when the estimate is above the configured claim gas limit.
    pub estimated_gas_limit: Option<u64>,
    pub threshold: U256,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
}

#[async_trait]
#[cfg_attr(test, automock)]
pub trait TransactionValidationServiceTrait: Send + Sync {
    async fn evaluate(
        &self,
        message: &Message,
        fee_recipient: Address,
    ) -> Result<ClaimValidation, ValidationError>;
}

/// Fee paid per unit of gas, 0 when `gas_limit` is 0.
pub fn gas_estimation_threshold(fee: U256, gas_limit: u64) -> U256 {
    if gas_limit == 0 {
        return U256::ZERO;
    }
    fee / U256::from(gas_limit)
}

/// `gasLimit * maxFeePerGas * round(profitMargin * S) > fee * S`
pub fn is_under_priced(gas_limit: u64, max_fee_per_gas: u128, profit_margin: f64, fee: U256) -> bool {
    let scale = U256::from(PROFIT_MARGIN_PRECISION);
    let margin = U256::from((profit_margin * PROFIT_MARGIN_PRECISION as f64).round() as u128);
    let cost = U256::from(gas_limit)
        .saturating_mul(U256::from(max_fee_per_gas))
        .saturating_mul(margin);
    cost > fee.saturating_mul(scale)
}

impl ValidationConfig {
    /// Turns a gas estimate and its fee parameters into a [`ClaimValidation`].
    fn assess(
        &self,
        message: &Message,
        gas_limit: u64,
        fees: GasFees,
        is_rate_limit_exceeded: bool,
    ) -> ClaimValidation {
        ClaimValidation {
            has_zero_fee: message.fee.is_zero() && self.profit_margin != 0.0,
            is_under_priced: is_under_priced(
                gas_limit,
                fees.max_fee_per_gas,
                self.profit_margin,
                message.fee,
            ),
            is_rate_limit_exceeded,
            is_for_sponsorship: self.is_postman_sponsorship_enabled
                && gas_limit < self.max_postman_sponsor_gas_limit,
            estimated_gas_limit: (gas_limit <= self.max_claim_gas_limit).then_some(gas_limit),
            threshold: gas_estimation_threshold(message.fee, gas_limit),
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            max_fee_per_gas: fees.max_fee_per_gas,
        }
    }
}

pub enum TransactionValidationService<C, G, P>
where
    C: MessageServiceClientTrait,
    G: GasProviderTrait,
    P: ChainProviderTrait,
{
    Ethereum(EthereumTransactionValidationService<C, G>),
    Linea(LineaTransactionValidationService<C, P>),
    #[cfg(test)]
    Mock(MockTransactionValidationServiceTrait),
}

#[async_trait]
impl<C, G, P> TransactionValidationServiceTrait for TransactionValidationService<C, G, P>
where
    C: MessageServiceClientTrait + 'static,
    G: GasProviderTrait + 'static,
    P: ChainProviderTrait + 'static,
{
    async fn evaluate(
        &self,
        message: &Message,
        fee_recipient: Address,
    ) -> Result<ClaimValidation, ValidationError> {
        match self {
            Self::Ethereum(service) => service.evaluate(message, fee_recipient).await,
            Self::Linea(service) => service.evaluate(message, fee_recipient).await,
            #[cfg(test)]
            Self::Mock(mock) => mock.evaluate(message, fee_recipient).await,
        }
    }
}
