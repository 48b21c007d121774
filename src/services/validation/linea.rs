use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;

use super::{ClaimValidation, TransactionValidationServiceTrait, ValidationConfig};
use crate::{
    models::{Message, ValidationError},
    services::{ChainProviderTrait, LineaGasProvider, MessageServiceClientTrait},
};

/// Validates claims on Linea, where the gas price depends on the compressed transaction size.
///
/// Messages reach this service once their `compressed_transaction_size` is known.
pub struct LineaTransactionValidationService<C, P>
where
    C: MessageServiceClientTrait,
    P: ChainProviderTrait,
{
    client: Arc<C>,
    gas_provider: Arc<LineaGasProvider<P>>,
    config: ValidationConfig,
}

impl<C, P> LineaTransactionValidationService<C, P>
where
    C: MessageServiceClientTrait,
    P: ChainProviderTrait,
{
    pub fn new(client: Arc<C>, gas_provider: Arc<LineaGasProvider<P>>, config: ValidationConfig) -> Self {
        Self {
            client,
            gas_provider,
            config,
        }
    }
}

#[async_trait]
impl<C, P> TransactionValidationServiceTrait for LineaTransactionValidationService<C, P>
where
    C: MessageServiceClientTrait + 'static,
    P: ChainProviderTrait + 'static,
{
    async fn evaluate(
        &self,
        message: &Message,
        fee_recipient: Address,
    ) -> Result<ClaimValidation, ValidationError> {
        let compressed_size = message
            .compressed_transaction_size
            .ok_or(ValidationError::MissingCompressedSize(message.message_hash))?;
        let request = self.client.build_claim_request(message, fee_recipient);
        let sized_gas_limit = message.claim_tx_gas_limit.unwrap_or_default();

        let (gas_limit, fees) = tokio::try_join!(
            async {
                self.client
                    .estimate_claim_gas(message, fee_recipient)
                    .await
                    .map_err(ValidationError::from)
            },
            async {
                self.gas_provider
                    .get_claim_gas_fees(&request, compressed_size, sized_gas_limit)
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
