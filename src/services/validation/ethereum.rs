use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;

use super::{ClaimValidation, TransactionValidationServiceTrait, ValidationConfig};
use crate::{
    models::{Message, ValidationError},
    services::{GasProviderTrait, MessageServiceClientTrait},
};

/// Validates claims on a chain with a flat gas price.
pub struct EthereumTransactionValidationService<C, G>
where
    C: MessageServiceClientTrait,
    G: GasProviderTrait,
{
    client: Arc<C>,
    gas_provider: Arc<G>,
    config: ValidationConfig,
}

impl<C, G> EthereumTransactionValidationService<C, G>
where
    C: MessageServiceClientTrait,
    G: GasProviderTrait,
{
    pub fn new(client: Arc<C>, gas_provider: Arc<G>, config: ValidationConfig) -> Self {
        Self {
            client,
            gas_provider,
            config,
        }
    }
}

#[async_trait]
impl<C, G> TransactionValidationServiceTrait for EthereumTransactionValidationService<C, G>
where
    C: MessageServiceClientTrait + 'static,
    G: GasProviderTrait + 'static,
{
    async fn evaluate(
        &self,
        message: &Message,
        fee_recipient: Address,
    ) -> Result<ClaimValidation, ValidationError> {
        let (gas_limit, fees) = tokio::try_join!(
            async {
                self.client
                    .estimate_claim_gas(message, fee_recipient)
                    .await
                    .map_err(ValidationError::from)
            },
            async {
                self.gas_provider
                    .get_gas_fees()
                    .await
                    .map_err(ValidationError::from)
            },
        )?;

        let is_rate_limit_exceeded = self
            .client
            .is_rate_limit_exceeded(message.fee, message.value)
            .await?;

        Ok(self
            .config
            .assess(message, gas_limit, fees, is_rate_limit_exceeded))
    }
}
