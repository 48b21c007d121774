//! EVM Provider implementation for interacting with the chains a relayer connects.
//!
//! Every call goes through [`retry_rpc_call`], so transient node failures are retried with
//! backoff before reaching the processors.

use std::time::Duration;

use alloy::{
    primitives::{Address, Bytes, B256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::{
        client::ClientBuilder,
        types::{
            BlockId, BlockNumberOrTag, BlockTransactionsKind, Filter, Log, TransactionRequest,
        },
    },
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use reqwest::ClientBuilder as ReqwestClientBuilder;

use super::{retry_rpc_call, RetryConfig};
use crate::models::{
    FeeHistoryData, LineaGasEstimate, ProviderError, SubmittedTransaction,
    TransactionReceiptData,
};

#[cfg(test)]
use mockall::automock;

/// Provider implementation for EVM-compatible chains.
///
/// Wraps an HTTP RPC provider bound to a single node URL.
#[derive(Clone)]
pub struct EvmProvider {
    provider: RootProvider<Http<Client>>,
    url: String,
    timeout_ms: u64,
    retry_config: RetryConfig,
}

/// Chain operations used by the contract clients, gas providers and processors.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait ChainProviderTrait: Send + Sync {
    /// Gets the current block number of the chain.
    async fn get_block_number(&self) -> Result<u64, ProviderError>;

    async fn get_chain_id(&self) -> Result<u64, ProviderError>;

    /// Gets the receipt of a mined transaction, `None` while it is not mined.
    async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceiptData>, ProviderError>;

    /// Gets the transaction count of an address, including pool transactions when `pending`.
    async fn get_transaction_count(
        &self,
        address: Address,
        pending: bool,
    ) -> Result<u64, ProviderError>;

    /// Gets a broadcast transaction by hash.
    async fn get_transaction(
        &self,
        tx_hash: B256,
    ) -> Result<Option<SubmittedTransaction>, ProviderError>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, ProviderError>;

    /// Executes a read-only call, at the latest block unless `block_number` is given.
    async fn call_contract(
        &self,
        tx: &TransactionRequest,
        block_number: Option<u64>,
    ) -> Result<Bytes, ProviderError>;

    /// Gets base fees and priority fee rewards of the latest `block_count` blocks.
    async fn get_fee_history(
        &self,
        block_count: u64,
        reward_percentiles: Vec<f64>,
    ) -> Result<FeeHistoryData, ProviderError>;

    /// Calls the Linea-specific `linea_estimateGas` method.
    async fn linea_estimate_gas(
        &self,
        tx: &TransactionRequest,
    ) -> Result<LineaGasEstimate, ProviderError>;

    /// Gets the `extraData` field of the latest block header.
    async fn get_block_extra_data(&self) -> Result<Bytes, ProviderError>;

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError>;

    /// Broadcasts a signed transaction and returns its hash.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, ProviderError>;
}

impl EvmProvider {
    /// Creates a new EVM provider instance.
    ///
    /// # Arguments
    /// * `url` - The JSON-RPC endpoint of the node
    /// * `timeout_ms` - Timeout of a single request
    /// * `retry_config` - Retry behavior of every call
    pub fn new(url: &str, timeout_ms: u64, retry_config: RetryConfig) -> Result<Self, ProviderError> {
        let rpc_url = url.parse().map_err(|e| {
            ProviderError::NetworkConfiguration(format!("Invalid URL format: {}", e))
        })?;

        let client = ReqwestClientBuilder::default()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ProviderError::Other(format!("Failed to build HTTP client: {}", e)))?;

        let mut transport = Http::new(rpc_url);
        transport.set_client(client);

        let is_local = transport.guess_local();
        let client = ClientBuilder::default().transport(transport, is_local);

        Ok(Self {
            provider: ProviderBuilder::new().on_client(client),
            url: url.to_string(),
            timeout_ms,
            retry_config,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn retry_rpc_call<T, F, Fut>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, ProviderError>
    where
        F: Fn(RootProvider<Http<Client>>) -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        log::debug!(
            "Starting RPC operation '{}' with timeout: {}ms",
            operation_name,
            self.timeout_ms
        );

        retry_rpc_call(
            operation_name,
            ProviderError::is_transient,
            || operation(self.provider.clone()),
            &self.retry_config,
        )
        .await
    }
}

#[async_trait]
impl ChainProviderTrait for EvmProvider {
    async fn get_block_number(&self) -> Result<u64, ProviderError> {
        self.retry_rpc_call("get_block_number", |provider| async move {
            provider
                .get_block_number()
                .await
                .map_err(ProviderError::from)
        })
        .await
    }

    async fn get_chain_id(&self) -> Result<u64, ProviderError> {
        self.retry_rpc_call("get_chain_id", |provider| async move {
            provider.get_chain_id().await.map_err(ProviderError::from)
        })
        .await
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceiptData>, ProviderError> {
        let receipt = self
            .retry_rpc_call("get_transaction_receipt", move |provider| async move {
                provider
                    .get_transaction_receipt(tx_hash)
                    .await
                    .map_err(ProviderError::from)
            })
            .await?;

        Ok(receipt.map(|receipt| TransactionReceiptData {
            transaction_hash: receipt.transaction_hash,
            success: receipt.status(),
            gas_used: u64::try_from(receipt.gas_used).unwrap_or(u64::MAX),
            effective_gas_price: receipt.effective_gas_price,
            block_number: receipt.block_number,
        }))
    }

    async fn get_transaction_count(
        &self,
        address: Address,
        pending: bool,
    ) -> Result<u64, ProviderError> {
        self.retry_rpc_call("get_transaction_count", move |provider| async move {
            let request = provider.get_transaction_count(address);
            let request = if pending {
                request.pending()
            } else {
                request.latest()
            };
            request.await.map_err(ProviderError::from)
        })
        .await
    }

    async fn get_transaction(
        &self,
        tx_hash: B256,
    ) -> Result<Option<SubmittedTransaction>, ProviderError> {
        use alloy::consensus::Transaction as _;

        let tx = self
            .retry_rpc_call("get_transaction", move |provider| async move {
                provider
                    .get_transaction_by_hash(tx_hash)
                    .await
                    .map_err(ProviderError::from)
            })
            .await?;

        Ok(tx.map(|tx| SubmittedTransaction {
            hash: tx_hash,
            from: tx.from,
            to: tx.to(),
            nonce: tx.nonce(),
            gas_limit: tx.gas_limit(),
            max_fee_per_gas: tx.max_fee_per_gas(),
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas().unwrap_or_default(),
            value: tx.value(),
            input: tx.input().clone(),
            chain_id: tx.chain_id(),
            block_number: tx.block_number,
        }))
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, ProviderError> {
        self.retry_rpc_call("estimate_gas", move |provider| {
            let tx_req = tx.clone();
            async move {
                let gas = provider
                    .estimate_gas(&tx_req)
                    .await
                    .map_err(ProviderError::from)?;
                u64::try_from(gas)
                    .map_err(|_| ProviderError::InvalidResponse("Gas estimate overflow".into()))
            }
        })
        .await
    }

    async fn call_contract(
        &self,
        tx: &TransactionRequest,
        block_number: Option<u64>,
    ) -> Result<Bytes, ProviderError> {
        let block = block_number.map(BlockId::number).unwrap_or_else(BlockId::latest);
        self.retry_rpc_call("call_contract", move |provider| {
            let tx_req = tx.clone();
            async move {
                provider
                    .call(&tx_req)
                    .block(block)
                    .await
                    .map_err(ProviderError::from)
            }
        })
        .await
    }

    async fn get_fee_history(
        &self,
        block_count: u64,
        reward_percentiles: Vec<f64>,
    ) -> Result<FeeHistoryData, ProviderError> {
        let history = self
            .retry_rpc_call("get_fee_history", move |provider| {
                let reward_percentiles = reward_percentiles.clone();
                async move {
                    provider
                        .get_fee_history(block_count, BlockNumberOrTag::Latest, &reward_percentiles)
                        .await
                        .map_err(ProviderError::from)
                }
            })
            .await?;

        Ok(FeeHistoryData {
            oldest_block: history.oldest_block,
            base_fee_per_gas: history.base_fee_per_gas,
            reward: history.reward.unwrap_or_default(),
        })
    }

    async fn linea_estimate_gas(
        &self,
        tx: &TransactionRequest,
    ) -> Result<LineaGasEstimate, ProviderError> {
        self.retry_rpc_call("linea_estimate_gas", move |provider| {
            let tx_req = tx.clone();
            async move {
                provider
                    .raw_request::<_, LineaGasEstimate>("linea_estimateGas".into(), (tx_req,))
                    .await
                    .map_err(ProviderError::from)
            }
        })
        .await
    }

    async fn get_block_extra_data(&self) -> Result<Bytes, ProviderError> {
        let block = self
            .retry_rpc_call("get_block_extra_data", |provider| async move {
                provider
                    .get_block_by_number(BlockNumberOrTag::Latest, BlockTransactionsKind::Hashes)
                    .await
                    .map_err(ProviderError::from)
            })
            .await?;

        block
            .map(|block| block.header.extra_data.clone())
            .ok_or_else(|| ProviderError::InvalidResponse("Latest block not found".to_string()))
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError> {
        self.retry_rpc_call("get_logs", move |provider| {
            let filter = filter.clone();
            async move { provider.get_logs(&filter).await.map_err(ProviderError::from) }
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, ProviderError> {
        // Broadcasting is not idempotent across nodes, a single attempt is made.
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(ProviderError::from)?;
        Ok(*pending.tx_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn retry_config() -> RetryConfig {
        RetryConfig::new(1, 1, 1)
    }

    #[test]
    fn test_new_provider() {
        assert!(EvmProvider::new("http://localhost:8545", 1000, retry_config()).is_ok());

        let result = EvmProvider::new("invalid-url", 1000, retry_config());
        assert!(matches!(result, Err(ProviderError::NetworkConfiguration(_))));
    }

    #[test]
    fn test_provider_keeps_url() {
        let provider = EvmProvider::new("http://localhost:8545", 0, retry_config()).unwrap();
        assert_eq!(provider.url(), "http://localhost:8545");
    }

    #[tokio::test]
    async fn test_unreachable_node_surfaces_network_error() {
        // Nothing listens on port 9 of the loopback interface.
        let provider = EvmProvider::new("http://127.0.0.1:9", 500, retry_config()).unwrap();
        let err = provider.get_block_number().await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_mock_provider_methods() {
        let mut mock = MockChainProviderTrait::new();

        mock.expect_get_block_number()
            .times(1)
            .returning(|| async { Ok(12345) }.boxed());
        mock.expect_get_transaction_count()
            .withf(|_, pending| *pending)
            .times(1)
            .returning(|_, _| async { Ok(7) }.boxed());

        assert_eq!(mock.get_block_number().await.unwrap(), 12345);
        assert_eq!(
            mock.get_transaction_count(Address::ZERO, true).await.unwrap(),
            7
        );
    }
}
