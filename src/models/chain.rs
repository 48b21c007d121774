//! Chain-facing data carried between the contract clients and the processors.
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use super::GasFees;

/// A decoded `MessageSent` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSentEvent {
    pub message_sender: Address,
    pub destination: Address,
    pub fee: U256,
    pub value: U256,
    pub message_nonce: U256,
    pub calldata: Bytes,
    pub message_hash: B256,
    pub contract_address: Address,
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: B256,
}

/// Log query bounds and optional indexed-topic filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSentEventFilter {
    pub from_block: u64,
    pub to_block: u64,
    /// Logs of `from_block` below this index are skipped.
    pub from_block_log_index: u64,
    pub message_sender: Option<Address>,
    pub destination: Option<Address>,
}

/// Transaction parameters forced on a claim.
///
/// The gas limit is estimated by the client when absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimOverrides {
    pub nonce: u64,
    pub gas_limit: Option<u64>,
    pub fees: GasFees,
}

/// What the node accepted when a claim was broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimSubmission {
    pub tx_hash: B256,
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Subset of a transaction receipt the relayer acts upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReceiptData {
    pub transaction_hash: B256,
    pub success: bool,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub block_number: Option<u64>,
}

/// Fields of an already-broadcast EIP-1559 transaction, used to replay or re-price it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub value: U256,
    pub input: Bytes,
    pub chain_id: Option<u64>,
    pub block_number: Option<u64>,
}

/// A signed, RLP/EIP-2718 encoded transaction ready to broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: B256,
    pub raw: Bytes,
}

/// Response of the `linea_estimateGas` RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineaGasEstimate {
    #[serde(with = "alloy::serde::quantity")]
    pub gas_limit: u64,
    #[serde(with = "alloy::serde::quantity")]
    pub base_fee_per_gas: u128,
    #[serde(with = "alloy::serde::quantity")]
    pub priority_fee_per_gas: u128,
}
