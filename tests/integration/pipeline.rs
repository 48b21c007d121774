//! Anchoring and claiming pollers racing on one in-memory store while new messages arrive.
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use alloy::{
    primitives::{keccak256, Address, Bytes, B256, U256},
    rpc::types::{Filter, Log, TransactionRequest},
};
use async_trait::async_trait;
use postman_relayer::{
    domain::{
        AnchoringProcessorConfig, ClaimingProcessorConfig, MessageAnchoringProcessor,
        MessageClaimingProcessor, NonceCoordinator,
    },
    jobs::Poller,
    models::{
        ChainError, ClaimOverrides, ClaimSubmission, Direction, FeeHistoryData, GasFees,
        LineaGasEstimate, Message, MessageSentEvent, MessageStatus, OnChainMessageStatus,
        ProviderError, SignedTransaction, SubmittedTransaction, TransactionReceiptData,
        ValidationError,
    },
    repositories::{InMemoryMessageRepository, MessageRepository},
    services::{
        ChainProviderTrait, ClaimValidation, GasProviderTrait, MessageServiceClientTrait,
        TransactionValidationServiceTrait,
    },
};

const ORIGIN_CONTRACT: Address = Address::repeat_byte(0x33);
const SIGNER: Address = Address::repeat_byte(0x44);
const DIRECTION: Direction = Direction::L2ToL1;
const MESSAGES: u64 = 30;

fn unsupported() -> ProviderError {
    ProviderError::InvalidResponse("not served by the fake chain".to_string())
}

/// Chain whose signer nonce follows the number of broadcast claims.
struct FakeChain {
    broadcast: Arc<AtomicU64>,
}

#[async_trait]
impl ChainProviderTrait for FakeChain {
    async fn get_block_number(&self) -> Result<u64, ProviderError> {
        Ok(1_000)
    }

    async fn get_chain_id(&self) -> Result<u64, ProviderError> {
        Ok(1)
    }

    async fn get_transaction_receipt(
        &self,
        _tx_hash: B256,
    ) -> Result<Option<TransactionReceiptData>, ProviderError> {
        Ok(None)
    }

    async fn get_transaction_count(
        &self,
        _address: Address,
        _pending: bool,
    ) -> Result<u64, ProviderError> {
        Ok(self.broadcast.load(Ordering::SeqCst))
    }

    async fn get_transaction(
        &self,
        _tx_hash: B256,
    ) -> Result<Option<SubmittedTransaction>, ProviderError> {
        Ok(None)
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<u64, ProviderError> {
        Ok(60_000)
    }

    async fn call_contract(
        &self,
        _tx: &TransactionRequest,
        _block_number: Option<u64>,
    ) -> Result<Bytes, ProviderError> {
        Err(unsupported())
    }

    async fn get_fee_history(
        &self,
        _block_count: u64,
        _reward_percentiles: Vec<f64>,
    ) -> Result<FeeHistoryData, ProviderError> {
        Err(unsupported())
    }

    async fn linea_estimate_gas(
        &self,
        _tx: &TransactionRequest,
    ) -> Result<LineaGasEstimate, ProviderError> {
        Err(unsupported())
    }

    async fn get_block_extra_data(&self) -> Result<Bytes, ProviderError> {
        Err(unsupported())
    }

    async fn get_logs(&self, _filter: &Filter) -> Result<Vec<Log>, ProviderError> {
        Ok(Vec::new())
    }

    async fn send_raw_transaction(&self, _raw: &[u8]) -> Result<B256, ProviderError> {
        Err(unsupported())
    }
}

/// Message service counting every claim it receives.
#[derive(Default)]
struct FakeMessageService {
    broadcast: Arc<AtomicU64>,
    claims: Mutex<HashMap<B256, usize>>,
}

#[async_trait]
impl MessageServiceClientTrait for FakeMessageService {
    fn contract_address(&self) -> Address {
        Address::repeat_byte(0x55)
    }

    fn signer_address(&self) -> Address {
        SIGNER
    }

    async fn get_message_status(
        &self,
        message_hash: B256,
        _block_number: Option<u64>,
    ) -> Result<OnChainMessageStatus, ChainError> {
        let claimed = self.claims.lock().unwrap().contains_key(&message_hash);
        Ok(if claimed {
            OnChainMessageStatus::Claimed
        } else {
            OnChainMessageStatus::Claimable
        })
    }

    async fn get_message_by_hash(
        &self,
        _message_hash: B256,
    ) -> Result<Option<MessageSentEvent>, ChainError> {
        Ok(None)
    }

    fn encode_claim_calldata(&self, _message: &Message, _fee_recipient: Address) -> Bytes {
        Bytes::new()
    }

    fn build_claim_request(&self, _message: &Message, _fee_recipient: Address) -> TransactionRequest {
        TransactionRequest::default()
    }

    async fn estimate_claim_gas(
        &self,
        _message: &Message,
        _fee_recipient: Address,
    ) -> Result<u64, ChainError> {
        Ok(60_000)
    }

    async fn sign_claim_transaction(
        &self,
        _message: &Message,
        _overrides: ClaimOverrides,
        _fee_recipient: Address,
    ) -> Result<SignedTransaction, ChainError> {
        Err(ChainError::Signing("not used by this pipeline".to_string()))
    }

    async fn claim(
        &self,
        message: &Message,
        overrides: ClaimOverrides,
        _fee_recipient: Address,
    ) -> Result<ClaimSubmission, ChainError> {
        *self
            .claims
            .lock()
            .unwrap()
            .entry(message.message_hash)
            .or_default() += 1;
        self.broadcast.fetch_add(1, Ordering::SeqCst);

        Ok(ClaimSubmission {
            tx_hash: keccak256(message.message_hash),
            nonce: overrides.nonce,
            gas_limit: overrides.gas_limit.unwrap_or(60_000),
            max_fee_per_gas: overrides.fees.max_fee_per_gas,
            max_priority_fee_per_gas: overrides.fees.max_priority_fee_per_gas,
        })
    }

    async fn is_rate_limit_exceeded(&self, _fee: U256, _value: U256) -> Result<bool, ChainError> {
        Ok(false)
    }

    async fn is_rate_limit_exceeded_error(&self, _tx_hash: B256) -> Result<bool, ChainError> {
        Ok(false)
    }

    async fn retry_with_higher_fee(
        &self,
        _tx_hash: B256,
        _bump_percent: u64,
    ) -> Result<ClaimSubmission, ChainError> {
        Err(ChainError::Rejected("not used by this pipeline".to_string()))
    }
}

const FEES: GasFees = GasFees {
    max_fee_per_gas: 2_000_000_000,
    max_priority_fee_per_gas: 1_000_000_000,
};

struct ProfitableValidation;

#[async_trait]
impl TransactionValidationServiceTrait for ProfitableValidation {
    async fn evaluate(
        &self,
        message: &Message,
        _fee_recipient: Address,
    ) -> Result<ClaimValidation, ValidationError> {
        Ok(ClaimValidation {
            has_zero_fee: false,
            is_under_priced: false,
            is_rate_limit_exceeded: false,
            is_for_sponsorship: false,
            estimated_gas_limit: Some(60_000),
            threshold: message.fee / U256::from(60_000u64),
            max_priority_fee_per_gas: FEES.max_priority_fee_per_gas,
            max_fee_per_gas: FEES.max_fee_per_gas,
        })
    }
}

struct FixedGas;

#[async_trait]
impl GasProviderTrait for FixedGas {
    async fn get_gas_fees(&self) -> Result<GasFees, ProviderError> {
        Ok(FEES)
    }
}

fn sent_message(index: u64) -> Message {
    let event = MessageSentEvent {
        message_sender: Address::repeat_byte(0x11),
        destination: Address::repeat_byte(0x22),
        fee: U256::from(10_000_000_000_000_000u64),
        value: U256::ZERO,
        message_nonce: U256::from(index),
        calldata: Bytes::new(),
        message_hash: keccak256(index.to_be_bytes()),
        contract_address: ORIGIN_CONTRACT,
        block_number: 100 + index,
        log_index: 0,
        transaction_hash: keccak256((index + 1_000).to_be_bytes()),
    };
    Message::from_event(&event, DIRECTION, MessageStatus::Sent)
}

async fn pending_count(repository: &InMemoryMessageRepository) -> usize {
    repository
        .count_by_status(DIRECTION)
        .await
        .unwrap()
        .get(&MessageStatus::Pending)
        .copied()
        .unwrap_or(0)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_messages_are_claimed_once_while_anchoring_races() {
    let repository = Arc::new(InMemoryMessageRepository::new());
    let broadcast = Arc::new(AtomicU64::new(0));
    let chain = Arc::new(FakeChain {
        broadcast: broadcast.clone(),
    });
    let client = Arc::new(FakeMessageService {
        broadcast,
        ..Default::default()
    });

    let anchoring = MessageAnchoringProcessor::new(
        repository.clone(),
        client.clone(),
        chain.clone(),
        AnchoringProcessorConfig {
            direction: DIRECTION,
            origin_contract_address: ORIGIN_CONTRACT,
            max_fetch_messages_from_db: 5,
        },
    );
    let nonce_coordinator = Arc::new(NonceCoordinator::new(
        repository.clone(),
        chain.clone(),
        SIGNER,
        DIRECTION,
        10_000,
    ));
    let claiming = MessageClaimingProcessor::new(
        repository.clone(),
        client.clone(),
        Arc::new(ProfitableValidation),
        Arc::new(FixedGas),
        nonce_coordinator,
        ClaimingProcessorConfig {
            direction: DIRECTION,
            origin_contract_address: ORIGIN_CONTRACT,
            fee_recipient: Address::ZERO,
            claimable_statuses: vec![MessageStatus::Anchored, MessageStatus::FeeUnderpriced],
            max_number_of_retries: 100,
            retry_delay_in_seconds: 0,
            profit_margin: 1.0,
            use_gas_price_threshold: false,
        },
    );

    let running = Arc::new(AtomicBool::new(true));
    let handles = vec![
        Poller::new(DIRECTION, Arc::new(anchoring), 1).start(running.clone()),
        Poller::new(DIRECTION, Arc::new(claiming), 1).start(running.clone()),
    ];

    for index in 0..MESSAGES {
        assert!(repository.insert_if_absent(sent_message(index)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    for _ in 0..500 {
        if pending_count(&repository).await == MESSAGES as usize {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    running.store(false, Ordering::Relaxed);
    for handle in handles {
        handle.await.unwrap();
    }

    let claims = client.claims.lock().unwrap().clone();
    assert_eq!(claims.len(), MESSAGES as usize);
    assert!(claims.values().all(|count| *count == 1), "{:?}", claims);

    let mut nonces = HashSet::new();
    for index in 0..MESSAGES {
        let hash = keccak256(index.to_be_bytes());
        let stored = repository.find(hash, DIRECTION).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Pending);
        assert_eq!(stored.claim_tx_hash, Some(keccak256(hash)));
        assert!(nonces.insert(stored.claim_tx_nonce.unwrap()));
    }
    assert_eq!(nonces, (0..MESSAGES).collect::<HashSet<_>>());
}
