//! Client of the message service contract deployed on a destination chain.
//!
//! Claims are built as EIP-1559 transactions, signed by a [`ClaimSigner`] and broadcast
//! through the chain provider. Revert data coming back from the node is decoded into the
//! contract's custom error names before it reaches the processors.
use std::sync::Arc;

use alloy::{
    consensus::TxEip1559,
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxKind, B256, U256},
    rpc::types::{Filter, TransactionRequest},
    sol_types::{SolCall, SolEvent},
};
use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::OnceCell;

#[cfg(test)]
use mockall::automock;

use super::{
    abi::IMessageService::{
        claimMessageCall, currentPeriodAmountInWeiCall, inboxL1L2MessageStatusCall,
        inboxL2L1MessageStatusCall, limitInWeiCall, MessageSent,
    },
    decode_message_sent_log, is_rate_limit_revert, with_revert_reason,
};
use crate::{
    models::{
        ChainError, ClaimOverrides, ClaimSubmission, GasFees, Message, MessageSentEvent,
        OnChainMessageStatus, ProviderError, SignedTransaction,
    },
    services::{ChainProviderTrait, ClaimSigner},
};

/// Which message service contract a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageServiceFlavor {
    /// L1 contract. Claims of L2 messages land here and are subject to the withdrawal rate limit.
    LineaRollup,
    /// L2 contract. Claims of L1 messages land here.
    L2MessageService,
}

impl MessageServiceFlavor {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, MessageServiceFlavor::LineaRollup)
    }
}

#[derive(Debug, Clone)]
pub struct MessageServiceConfig {
    pub contract_address: Address,
    /// Contract claims are sent to, when it differs from `contract_address`.
    pub claim_via_address: Option<Address>,
    pub flavor: MessageServiceFlavor,
    pub max_fee_per_gas_cap: u128,
}

/// Claims on the destination message service.
///
/// On L1 only the legacy `claimMessage` entry point is used. Claiming with a Merkle proof
/// (`claimMessageWithProof`) is not supported.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait MessageServiceClientTrait: Send + Sync {
    fn contract_address(&self) -> Address;

    /// Address claim transactions are sent from.
    fn signer_address(&self) -> Address;

    /// Reads the inbox status of a message, at the latest block unless `block_number` is given.
    async fn get_message_status(
        &self,
        message_hash: B256,
        block_number: Option<u64>,
    ) -> Result<OnChainMessageStatus, ChainError>;

    /// Looks up the `MessageSent` event this contract emitted for `message_hash`.
    async fn get_message_by_hash(
        &self,
        message_hash: B256,
    ) -> Result<Option<MessageSentEvent>, ChainError>;

    fn encode_claim_calldata(&self, message: &Message, fee_recipient: Address) -> Bytes;

    /// Unsigned claim transaction, as used for gas estimation.
    fn build_claim_request(&self, message: &Message, fee_recipient: Address) -> TransactionRequest;

    async fn estimate_claim_gas(
        &self,
        message: &Message,
        fee_recipient: Address,
    ) -> Result<u64, ChainError>;

    /// Builds and signs a claim transaction without broadcasting it.
    async fn sign_claim_transaction(
        &self,
        message: &Message,
        overrides: ClaimOverrides,
        fee_recipient: Address,
    ) -> Result<SignedTransaction, ChainError>;

    async fn claim(
        &self,
        message: &Message,
        overrides: ClaimOverrides,
        fee_recipient: Address,
    ) -> Result<ClaimSubmission, ChainError>;

    /// Whether claiming `fee + value` would exceed the remaining withdrawal allowance.
    async fn is_rate_limit_exceeded(&self, fee: U256, value: U256) -> Result<bool, ChainError>;

    /// Replays a reverted transaction at its block and checks if it failed on the rate limit.
    async fn is_rate_limit_exceeded_error(&self, tx_hash: B256) -> Result<bool, ChainError>;

    /// Resends a transaction with the same nonce and fees raised by `bump_percent`.
    async fn retry_with_higher_fee(
        &self,
        tx_hash: B256,
        bump_percent: u64,
    ) -> Result<ClaimSubmission, ChainError>;
}

pub struct MessageServiceClient<P, S>
where
    P: ChainProviderTrait,
    S: ClaimSigner,
{
    provider: Arc<P>,
    signer: Arc<S>,
    config: MessageServiceConfig,
    chain_id: OnceCell<u64>,
}

impl<P, S> MessageServiceClient<P, S>
where
    P: ChainProviderTrait,
    S: ClaimSigner,
{
    pub fn new(provider: Arc<P>, signer: Arc<S>, config: MessageServiceConfig) -> Self {
        Self {
            provider,
            signer,
            config,
            chain_id: OnceCell::new(),
        }
    }

    fn claim_target(&self) -> Address {
        self.config
            .claim_via_address
            .unwrap_or(self.config.contract_address)
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.chain_id
            .get_or_try_init(|| async {
                self.provider
                    .get_chain_id()
                    .await
                    .map_err(ChainError::from)
            })
            .await
            .copied()
    }

    async fn read<C: SolCall>(&self, call: C, block_number: Option<u64>) -> Result<C::Return, ChainError> {
        let request = TransactionRequest::default()
            .with_to(self.config.contract_address)
            .with_input(call.abi_encode());
        let output = self
            .provider
            .call_contract(&request, block_number)
            .await
            .map_err(|e| with_revert_reason(e.into()))?;

        C::abi_decode_returns(&output, true).map_err(|e| {
            ChainError::InvalidResponse(format!("Failed to decode {}: {}", C::SIGNATURE, e))
        })
    }

    async fn sign(
        &self,
        to: Address,
        input: Bytes,
        nonce: u64,
        gas_limit: u64,
        fees: GasFees,
    ) -> Result<SignedTransaction, ChainError> {
        let tx = TxEip1559 {
            chain_id: self.chain_id().await?,
            nonce,
            gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            to: TxKind::Call(to),
            value: U256::ZERO,
            access_list: Default::default(),
            input,
        };
        self.signer.sign_transaction(tx).await
    }

    async fn broadcast(&self, signed: &SignedTransaction) -> Result<B256, ChainError> {
        self.provider
            .send_raw_transaction(&signed.raw)
            .await
            .map_err(|e| with_revert_reason(e.into()))
    }
}

fn status_from_code(code: U256) -> OnChainMessageStatus {
    match code.to::<u64>() {
        1 => OnChainMessageStatus::Claimable,
        2 => OnChainMessageStatus::Claimed,
        _ => OnChainMessageStatus::Unknown,
    }
}

#[async_trait]
impl<P, S> MessageServiceClientTrait for MessageServiceClient<P, S>
where
    P: ChainProviderTrait + 'static,
    S: ClaimSigner + 'static,
{
    fn contract_address(&self) -> Address {
        self.config.contract_address
    }

    fn signer_address(&self) -> Address {
        self.signer.address()
    }

    async fn get_message_status(
        &self,
        message_hash: B256,
        block_number: Option<u64>,
    ) -> Result<OnChainMessageStatus, ChainError> {
        let code = match self.config.flavor {
            MessageServiceFlavor::L2MessageService => {
                self.read(
                    inboxL1L2MessageStatusCall {
                        messageHash: message_hash,
                    },
                    block_number,
                )
                .await?
                .status
            }
            MessageServiceFlavor::LineaRollup => {
                self.read(
                    inboxL2L1MessageStatusCall {
                        messageHash: message_hash,
                    },
                    block_number,
                )
                .await?
                .status
            }
        };

        if code > U256::from(u64::MAX) {
            return Ok(OnChainMessageStatus::Unknown);
        }
        Ok(status_from_code(code))
    }

    async fn get_message_by_hash(
        &self,
        message_hash: B256,
    ) -> Result<Option<MessageSentEvent>, ChainError> {
        let filter = Filter::new()
            .address(self.config.contract_address)
            .event_signature(MessageSent::SIGNATURE_HASH)
            .topic3(message_hash)
            .from_block(0u64);

        let logs = self.provider.get_logs(&filter).await?;
        logs.first().map(decode_message_sent_log).transpose()
    }

    fn encode_claim_calldata(&self, message: &Message, fee_recipient: Address) -> Bytes {
        claimMessageCall {
            _from: message.message_sender,
            _to: message.destination,
            _fee: message.fee,
            _value: message.value,
            _feeRecipient: fee_recipient,
            _calldata: message.calldata.clone(),
            _nonce: message.message_nonce,
        }
        .abi_encode()
        .into()
    }

    fn build_claim_request(&self, message: &Message, fee_recipient: Address) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.signer.address())
            .with_to(self.claim_target())
            .with_input(self.encode_claim_calldata(message, fee_recipient))
    }

    async fn estimate_claim_gas(
        &self,
        message: &Message,
        fee_recipient: Address,
    ) -> Result<u64, ChainError> {
        let request = self.build_claim_request(message, fee_recipient);
        self.provider
            .estimate_gas(&request)
            .await
            .map_err(|e| with_revert_reason(e.into()))
    }

    async fn sign_claim_transaction(
        &self,
        message: &Message,
        overrides: ClaimOverrides,
        fee_recipient: Address,
    ) -> Result<SignedTransaction, ChainError> {
        let gas_limit = match overrides.gas_limit {
            Some(gas_limit) => gas_limit,
            None => self.estimate_claim_gas(message, fee_recipient).await?,
        };

        self.sign(
            self.claim_target(),
            self.encode_claim_calldata(message, fee_recipient),
            overrides.nonce,
            gas_limit,
            overrides.fees.capped(self.config.max_fee_per_gas_cap),
        )
        .await
    }

    async fn claim(
        &self,
        message: &Message,
        overrides: ClaimOverrides,
        fee_recipient: Address,
    ) -> Result<ClaimSubmission, ChainError> {
        let gas_limit = match overrides.gas_limit {
            Some(gas_limit) => gas_limit,
            None => self.estimate_claim_gas(message, fee_recipient).await?,
        };
        let fees = overrides.fees.capped(self.config.max_fee_per_gas_cap);
        let overrides = ClaimOverrides {
            gas_limit: Some(gas_limit),
            fees,
            ..overrides
        };

        let signed = self
            .sign_claim_transaction(message, overrides, fee_recipient)
            .await?;
        let tx_hash = self.broadcast(&signed).await?;

        debug!(
            "Claim transaction sent: messageHash={} transactionHash={} nonce={}",
            message.message_hash, tx_hash, overrides.nonce
        );

        Ok(ClaimSubmission {
            tx_hash,
            nonce: overrides.nonce,
            gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
        })
    }

    async fn is_rate_limit_exceeded(&self, fee: U256, value: U256) -> Result<bool, ChainError> {
        if !self.config.flavor.is_rate_limited() {
            return Ok(false);
        }

        let limit = self.read(limitInWeiCall {}, None).await?.limit;
        let current = self
            .read(currentPeriodAmountInWeiCall {}, None)
            .await?
            .amount;

        Ok(current.saturating_add(fee).saturating_add(value) > limit)
    }

    async fn is_rate_limit_exceeded_error(&self, tx_hash: B256) -> Result<bool, ChainError> {
        if !self.config.flavor.is_rate_limited() {
            return Ok(false);
        }

        let Some(tx) = self.provider.get_transaction(tx_hash).await? else {
            return Ok(false);
        };

        let mut request = TransactionRequest::default()
            .with_from(tx.from)
            .with_input(tx.input.clone())
            .with_value(tx.value);
        if let Some(to) = tx.to {
            request = request.with_to(to);
        }

        match self.provider.call_contract(&request, tx.block_number).await {
            Ok(_) => Ok(false),
            Err(ProviderError::Rpc {
                revert_data: Some(data),
                ..
            }) => Ok(is_rate_limit_revert(&data)),
            Err(ProviderError::Rpc { message, .. }) => Ok(message.contains("RateLimitExceeded")),
            Err(e) if e.is_transient() => Err(e.into()),
            Err(_) => Ok(false),
        }
    }

    async fn retry_with_higher_fee(
        &self,
        tx_hash: B256,
        bump_percent: u64,
    ) -> Result<ClaimSubmission, ChainError> {
        let tx = self
            .provider
            .get_transaction(tx_hash)
            .await?
            .ok_or_else(|| {
                ChainError::InvalidResponse(format!("Transaction {} not found", tx_hash))
            })?;

        let fees = GasFees {
            max_fee_per_gas: tx.max_fee_per_gas,
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
        }
        .bumped(u128::from(bump_percent), self.config.max_fee_per_gas_cap);

        let to = tx.to.unwrap_or_else(|| self.claim_target());
        let signed = self
            .sign(to, tx.input.clone(), tx.nonce, tx.gas_limit, fees)
            .await?;
        let new_hash = self.broadcast(&signed).await?;

        info!(
            "Transaction resent with higher fee: previousTransactionHash={} transactionHash={} maxFeePerGas={} maxPriorityFeePerGas={}",
            tx_hash, new_hash, fees.max_fee_per_gas, fees.max_priority_fee_per_gas
        );

        Ok(ClaimSubmission {
            tx_hash: new_hash,
            nonce: tx.nonce,
            gas_limit: tx.gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Direction, MessageStatus, SubmittedTransaction},
        services::{MockChainProviderTrait, MockClaimSigner},
        utils::mocks::mockutils::{create_mock_message, TEST_CONTRACT_ADDRESS, TEST_SIGNER},
    };
    use alloy::primitives::{address, keccak256};
    use alloy::sol_types::SolError;
    use futures::FutureExt;

    use super::super::abi::IMessageService::RateLimitExceeded;

    const CLAIM_VIA: Address = address!("1111111111111111111111111111111111111111");
    const CAP: u128 = 100_000_000_000;

    fn config(flavor: MessageServiceFlavor) -> MessageServiceConfig {
        MessageServiceConfig {
            contract_address: TEST_CONTRACT_ADDRESS,
            claim_via_address: None,
            flavor,
            max_fee_per_gas_cap: CAP,
        }
    }

    fn signer() -> MockClaimSigner {
        let mut signer = MockClaimSigner::new();
        signer.expect_address().return_const(TEST_SIGNER);
        signer
    }

    fn client(
        provider: MockChainProviderTrait,
        signer: MockClaimSigner,
        config: MessageServiceConfig,
    ) -> MessageServiceClient<MockChainProviderTrait, MockClaimSigner> {
        MessageServiceClient::new(Arc::new(provider), Arc::new(signer), config)
    }

    fn word(value: u64) -> Bytes {
        U256::from(value).to_be_bytes::<32>().to_vec().into()
    }

    fn fees() -> GasFees {
        GasFees {
            max_fee_per_gas: 20_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        }
    }

    #[tokio::test]
    async fn test_get_message_status_reads_l1_l2_inbox_at_block() {
        let mut provider = MockChainProviderTrait::new();
        provider
            .expect_call_contract()
            .withf(|req, block| {
                let selector = &req.input.input().unwrap()[..4];
                selector == inboxL1L2MessageStatusCall::SELECTOR && *block == Some(42)
            })
            .times(1)
            .returning(|_, _| async { Ok(word(1)) }.boxed());

        let client = client(provider, signer(), config(MessageServiceFlavor::L2MessageService));
        let status = client.get_message_status(B256::ZERO, Some(42)).await.unwrap();
        assert_eq!(status, OnChainMessageStatus::Claimable);
    }

    #[tokio::test]
    async fn test_get_message_status_uses_l2_l1_inbox_on_rollup() {
        let mut provider = MockChainProviderTrait::new();
        provider
            .expect_call_contract()
            .withf(|req, _| &req.input.input().unwrap()[..4] == inboxL2L1MessageStatusCall::SELECTOR)
            .returning(|_, _| async { Ok(word(2)) }.boxed());

        let client = client(provider, signer(), config(MessageServiceFlavor::LineaRollup));
        assert_eq!(
            client.get_message_status(B256::ZERO, None).await.unwrap(),
            OnChainMessageStatus::Claimed
        );
    }

    #[tokio::test]
    async fn test_claim_signs_for_claim_via_address_and_broadcasts() {
        let mut provider = MockChainProviderTrait::new();
        provider
            .expect_estimate_gas()
            .times(1)
            .returning(|_| async { Ok(60_000) }.boxed());
        provider
            .expect_get_chain_id()
            .times(1)
            .returning(|| async { Ok(59144) }.boxed());
        provider
            .expect_send_raw_transaction()
            .times(1)
            .returning(|_| async { Ok(keccak256("claim")) }.boxed());

        let mut signer = signer();
        signer
            .expect_sign_transaction()
            .withf(|tx| {
                tx.nonce == 7
                    && tx.gas_limit == 60_000
                    && tx.chain_id == 59144
                    && tx.to == TxKind::Call(CLAIM_VIA)
                    && tx.max_fee_per_gas == CAP
            })
            .times(1)
            .returning(|_| {
                async {
                    Ok(SignedTransaction {
                        hash: keccak256("claim"),
                        raw: Bytes::from(vec![2, 1]),
                    })
                }
                .boxed()
            });

        let mut config = config(MessageServiceFlavor::L2MessageService);
        config.claim_via_address = Some(CLAIM_VIA);
        let client = client(provider, signer, config);

        let message = create_mock_message(10, Direction::L1ToL2, MessageStatus::Anchored);
        let overrides = ClaimOverrides {
            nonce: 7,
            gas_limit: None,
            fees: GasFees {
                max_fee_per_gas: CAP * 2,
                max_priority_fee_per_gas: 1,
            },
        };
        let submission = client
            .claim(&message, overrides, Address::ZERO)
            .await
            .unwrap();

        assert_eq!(submission.tx_hash, keccak256("claim"));
        assert_eq!(submission.nonce, 7);
        assert_eq!(submission.gas_limit, 60_000);
        assert_eq!(submission.max_fee_per_gas, CAP);
    }

    #[tokio::test]
    async fn test_estimate_claim_gas_names_custom_revert() {
        let mut provider = MockChainProviderTrait::new();
        provider.expect_estimate_gas().returning(|_| {
            async {
                Err(ProviderError::Rpc {
                    code: 3,
                    message: "execution reverted".to_string(),
                    revert_data: Some(RateLimitExceeded {}.abi_encode().into()),
                })
            }
            .boxed()
        });

        let client = client(provider, signer(), config(MessageServiceFlavor::LineaRollup));
        let message = create_mock_message(10, Direction::L2ToL1, MessageStatus::Anchored);
        let err = client
            .estimate_claim_gas(&message, Address::ZERO)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ChainError::ExecutionReverted { ref reason, .. } if reason == "RateLimitExceeded")
        );
    }

    #[tokio::test]
    async fn test_rate_limit_check_only_on_rollup() {
        let client_l2 = client(
            MockChainProviderTrait::new(),
            signer(),
            config(MessageServiceFlavor::L2MessageService),
        );
        assert!(!client_l2
            .is_rate_limit_exceeded(U256::from(1), U256::from(1))
            .await
            .unwrap());

        let mut provider = MockChainProviderTrait::new();
        provider.expect_call_contract().returning(|req, _| {
            let is_limit = &req.input.input().unwrap()[..4] == limitInWeiCall::SELECTOR;
            async move { Ok(if is_limit { word(100) } else { word(90) }) }.boxed()
        });
        let client_l1 = client(provider, signer(), config(MessageServiceFlavor::LineaRollup));

        assert!(!client_l1
            .is_rate_limit_exceeded(U256::from(5), U256::from(5))
            .await
            .unwrap());
        assert!(client_l1
            .is_rate_limit_exceeded(U256::from(5), U256::from(6))
            .await
            .unwrap());
    }

    fn submitted(tx_hash: B256) -> SubmittedTransaction {
        SubmittedTransaction {
            hash: tx_hash,
            from: TEST_SIGNER,
            to: Some(TEST_CONTRACT_ADDRESS),
            nonce: 3,
            gas_limit: 80_000,
            max_fee_per_gas: fees().max_fee_per_gas,
            max_priority_fee_per_gas: fees().max_priority_fee_per_gas,
            value: U256::ZERO,
            input: Bytes::from(vec![0xaa]),
            chain_id: Some(1),
            block_number: Some(500),
        }
    }

    #[tokio::test]
    async fn test_is_rate_limit_exceeded_error_replays_transaction() {
        let tx_hash = keccak256("reverted");
        let mut provider = MockChainProviderTrait::new();
        provider
            .expect_get_transaction()
            .returning(move |hash| async move { Ok(Some(submitted(hash))) }.boxed());
        provider
            .expect_call_contract()
            .withf(|_, block| *block == Some(500))
            .times(1)
            .returning(|_, _| {
                async {
                    Err(ProviderError::Rpc {
                        code: 3,
                        message: "execution reverted".to_string(),
                        revert_data: Some(RateLimitExceeded {}.abi_encode().into()),
                    })
                }
                .boxed()
            });

        let client = client(provider, signer(), config(MessageServiceFlavor::LineaRollup));
        assert!(client.is_rate_limit_exceeded_error(tx_hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_retry_with_higher_fee_keeps_nonce() {
        let tx_hash = keccak256("stuck");
        let mut provider = MockChainProviderTrait::new();
        provider
            .expect_get_transaction()
            .returning(move |hash| async move { Ok(Some(submitted(hash))) }.boxed());
        provider
            .expect_get_chain_id()
            .returning(|| async { Ok(1) }.boxed());
        provider
            .expect_send_raw_transaction()
            .returning(|_| async { Ok(keccak256("replacement")) }.boxed());

        let mut signer = signer();
        signer
            .expect_sign_transaction()
            .withf(|tx| {
                tx.nonce == 3
                    && tx.gas_limit == 80_000
                    && tx.max_fee_per_gas == 22_000_000_000
                    && tx.max_priority_fee_per_gas == 1_100_000_000
            })
            .times(1)
            .returning(|_| {
                async {
                    Ok(SignedTransaction {
                        hash: keccak256("replacement"),
                        raw: Bytes::from(vec![2]),
                    })
                }
                .boxed()
            });

        let client = client(provider, signer, config(MessageServiceFlavor::L2MessageService));
        let submission = client.retry_with_higher_fee(tx_hash, 10).await.unwrap();
        assert_eq!(submission.tx_hash, keccak256("replacement"));
        assert_eq!(submission.nonce, 3);
        assert_eq!(submission.max_fee_per_gas, 22_000_000_000);
    }

    #[tokio::test]
    async fn test_retry_with_higher_fee_missing_transaction() {
        let mut provider = MockChainProviderTrait::new();
        provider
            .expect_get_transaction()
            .returning(|_| async { Ok(None) }.boxed());

        let client = client(provider, signer(), config(MessageServiceFlavor::L2MessageService));
        let err = client
            .retry_with_higher_fee(B256::ZERO, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidResponse(_)));
    }

    #[test]
    fn test_encode_claim_calldata_roundtrips() {
        let client = client(
            MockChainProviderTrait::new(),
            signer(),
            config(MessageServiceFlavor::L2MessageService),
        );
        let message = create_mock_message(10, Direction::L1ToL2, MessageStatus::Anchored);
        let encoded = client.encode_claim_calldata(&message, CLAIM_VIA);
        let decoded = claimMessageCall::abi_decode(&encoded, true).unwrap();
        assert_eq!(decoded._nonce, message.message_nonce);
        assert_eq!(decoded._feeRecipient, CLAIM_VIA);
        assert_eq!(decoded._from, message.message_sender);
    }
}
