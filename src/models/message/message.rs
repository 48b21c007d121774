use std::fmt;

use alloy::primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Direction, MessageStatus};
use crate::models::MessageSentEvent;

/// Persistent record of a message observed on the origin chain.
///
/// Identity is the pair (`message_hash`, `direction`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_hash: B256,
    pub direction: Direction,
    pub message_sender: Address,
    pub destination: Address,
    pub fee: U256,
    pub value: U256,
    pub message_nonce: U256,
    pub calldata: Bytes,
    pub contract_address: Address,
    pub sent_block_number: u64,
    pub sent_log_index: u64,
    pub status: MessageStatus,
    pub claim_tx_creation_date: Option<DateTime<Utc>>,
    pub claim_tx_gas_limit: Option<u64>,
    pub claim_tx_max_fee_per_gas: Option<u128>,
    pub claim_tx_max_priority_fee_per_gas: Option<u128>,
    pub claim_tx_nonce: Option<u64>,
    pub claim_tx_hash: Option<B256>,
    pub claim_number_of_retry: u32,
    pub claim_last_retried_at: Option<DateTime<Utc>>,
    pub claim_gas_estimation_threshold: Option<U256>,
    pub compressed_transaction_size: Option<u64>,
    pub is_for_sponsorship: bool,
    pub claim_tx_gas_used: Option<u64>,
    pub claim_tx_gas_price: Option<u128>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Builds a fresh record for an event read from the origin chain.
    pub fn from_event(event: &MessageSentEvent, direction: Direction, status: MessageStatus) -> Self {
        let now = Utc::now();
        Self {
            message_hash: event.message_hash,
            direction,
            message_sender: event.message_sender,
            destination: event.destination,
            fee: event.fee,
            value: event.value,
            message_nonce: event.message_nonce,
            calldata: event.calldata.clone(),
            contract_address: event.contract_address,
            sent_block_number: event.block_number,
            sent_log_index: event.log_index,
            status,
            claim_tx_creation_date: None,
            claim_tx_gas_limit: None,
            claim_tx_max_fee_per_gas: None,
            claim_tx_max_priority_fee_per_gas: None,
            claim_tx_nonce: None,
            claim_tx_hash: None,
            claim_number_of_retry: 0,
            claim_last_retried_at: None,
            claim_gas_estimation_threshold: None,
            compressed_transaction_size: None,
            is_for_sponsorship: false,
            claim_tx_gas_used: None,
            claim_tx_gas_price: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Key used by every storage backend.
    pub fn key(&self) -> (B256, Direction) {
        (self.message_hash, self.direction)
    }

    pub fn has_calldata(&self) -> bool {
        !self.calldata.is_empty()
    }

    pub fn set_status(&mut self, status: MessageStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Forgets the outcome of the previous claim transaction. The nonce is kept.
    pub fn clear_claim_result(&mut self) {
        self.claim_tx_hash = None;
        self.claim_tx_gas_used = None;
        self.claim_tx_gas_price = None;
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message(messageSender={}, destination={}, fee={}, value={}, messageNonce={}, \
             contractAddress={}, sentBlockNumber={}, messageHash={}, direction={}, status={}, \
             claimTxNonce={:?}, claimTxHash={:?}, claimNumberOfRetry={}, isForSponsorship={})",
            self.message_sender,
            self.destination,
            self.fee,
            self.value,
            self.message_nonce,
            self.contract_address,
            self.sent_block_number,
            self.message_hash,
            self.direction,
            self.status,
            self.claim_tx_nonce,
            self.claim_tx_hash,
            self.claim_number_of_retry,
            self.is_for_sponsorship,
        )
    }
}
