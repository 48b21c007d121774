//! Per-chain sections of the config file.
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{
    config::ConfigFileError,
    constants::{
        DEFAULT_BLOCK_CONFIRMATION, DEFAULT_GAS_ESTIMATION_PERCENTILE,
        DEFAULT_LISTENER_INTERVAL_MS, DEFAULT_MAX_BLOCKS_TO_FETCH_LOGS,
        DEFAULT_MAX_CLAIM_GAS_LIMIT, DEFAULT_MAX_FEE_PER_GAS_CAP,
        DEFAULT_MAX_FETCH_MESSAGES_FROM_DB, DEFAULT_MAX_NONCE_DIFF,
        DEFAULT_MAX_NUMBER_OF_RETRIES, DEFAULT_MAX_POSTMAN_SPONSOR_GAS_LIMIT,
        DEFAULT_MAX_TX_RETRIES, DEFAULT_MESSAGE_SUBMISSION_TIMEOUT_MS, DEFAULT_PROFIT_MARGIN,
        DEFAULT_RECEIPT_POLLING_INTERVAL_MS, DEFAULT_RETRY_DELAY_IN_SECONDS,
    },
    models::PlainOrEnvValue,
    services::CalldataFilter,
    utils::deserialize_wei,
};

fn default_true() -> bool {
    true
}
fn default_polling_interval() -> u64 {
    DEFAULT_LISTENER_INTERVAL_MS
}
fn default_receipt_polling_interval() -> u64 {
    DEFAULT_RECEIPT_POLLING_INTERVAL_MS
}
fn default_block_confirmation() -> u64 {
    DEFAULT_BLOCK_CONFIRMATION
}
fn default_max_fetch_messages_from_db() -> usize {
    DEFAULT_MAX_FETCH_MESSAGES_FROM_DB
}
fn default_max_blocks_to_fetch_logs() -> u64 {
    DEFAULT_MAX_BLOCKS_TO_FETCH_LOGS
}
fn default_profit_margin() -> f64 {
    DEFAULT_PROFIT_MARGIN
}
fn default_max_number_of_retries() -> u32 {
    DEFAULT_MAX_NUMBER_OF_RETRIES
}
fn default_retry_delay_in_seconds() -> u64 {
    DEFAULT_RETRY_DELAY_IN_SECONDS
}
fn default_message_submission_timeout() -> u64 {
    DEFAULT_MESSAGE_SUBMISSION_TIMEOUT_MS
}
fn default_max_nonce_diff() -> u64 {
    DEFAULT_MAX_NONCE_DIFF
}
fn default_max_fee_per_gas_cap() -> u128 {
    DEFAULT_MAX_FEE_PER_GAS_CAP
}
fn default_gas_estimation_percentile() -> f64 {
    DEFAULT_GAS_ESTIMATION_PERCENTILE
}
fn default_max_claim_gas_limit() -> u64 {
    DEFAULT_MAX_CLAIM_GAS_LIMIT
}
fn default_max_tx_retries() -> u32 {
    DEFAULT_MAX_TX_RETRIES
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalldataFilterConfig {
    pub criteria_expression: String,
    /// Human-readable signature of the function the calldata is decoded with.
    pub calldata_function_interface: String,
}

impl CalldataFilterConfig {
    pub fn compile(&self) -> Result<CalldataFilter, ConfigFileError> {
        CalldataFilter::compile(&self.criteria_expression, &self.calldata_function_interface)
            .map_err(|e| ConfigFileError::InvalidCalldataFilter(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventFilters {
    pub from_address_filter: Option<Address>,
    pub to_address_filter: Option<Address>,
    pub calldata_filter: Option<CalldataFilterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListenerConfig {
    #[serde(default = "default_polling_interval")]
    pub polling_interval: u64,
    #[serde(default = "default_receipt_polling_interval")]
    pub receipt_polling_interval: u64,
    #[serde(default)]
    pub initial_from_block: Option<u64>,
    #[serde(default = "default_block_confirmation")]
    pub block_confirmation: u64,
    #[serde(default = "default_max_fetch_messages_from_db")]
    pub max_fetch_messages_from_db: usize,
    #[serde(default = "default_max_blocks_to_fetch_logs")]
    pub max_blocks_to_fetch_logs: u64,
    #[serde(default)]
    pub event_filters: EventFilters,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            polling_interval: DEFAULT_LISTENER_INTERVAL_MS,
            receipt_polling_interval: DEFAULT_RECEIPT_POLLING_INTERVAL_MS,
            initial_from_block: None,
            block_confirmation: DEFAULT_BLOCK_CONFIRMATION,
            max_fetch_messages_from_db: DEFAULT_MAX_FETCH_MESSAGES_FROM_DB,
            max_blocks_to_fetch_logs: DEFAULT_MAX_BLOCKS_TO_FETCH_LOGS,
            event_filters: EventFilters::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimingConfig {
    pub signer_private_key: PlainOrEnvValue,
    #[serde(default)]
    pub fee_recipient_address: Option<Address>,
    #[serde(default)]
    pub claim_via_address: Option<Address>,
    #[serde(default = "default_profit_margin")]
    pub profit_margin: f64,
    #[serde(default = "default_max_number_of_retries")]
    pub max_number_of_retries: u32,
    #[serde(default = "default_retry_delay_in_seconds")]
    pub retry_delay_in_seconds: u64,
    /// Milliseconds without receipt before a claim is resent.
    #[serde(default = "default_message_submission_timeout")]
    pub message_submission_timeout: u64,
    #[serde(default = "default_max_nonce_diff")]
    pub max_nonce_diff: u64,
    #[serde(
        default = "default_max_fee_per_gas_cap",
        deserialize_with = "deserialize_wei"
    )]
    pub max_fee_per_gas_cap: u128,
    #[serde(default = "default_gas_estimation_percentile")]
    pub gas_estimation_percentile: f64,
    #[serde(default)]
    pub is_max_gas_fee_enforced: bool,
    #[serde(default)]
    pub is_postman_sponsorship_enabled: bool,
    #[serde(default)]
    pub max_postman_sponsor_gas_limit: Option<u64>,
    #[serde(default = "default_max_claim_gas_limit")]
    pub max_claim_gas_limit: u64,
    #[serde(default = "default_max_tx_retries")]
    pub max_tx_retries: u32,
}

impl ClaimingConfig {
    pub fn fee_recipient(&self) -> Address {
        self.fee_recipient_address.unwrap_or(Address::ZERO)
    }

    pub fn sponsor_gas_limit(&self) -> u64 {
        self.max_postman_sponsor_gas_limit
            .unwrap_or(DEFAULT_MAX_POSTMAN_SPONSOR_GAS_LIMIT)
    }

    fn validate(&self, section: &str) -> Result<(), ConfigFileError> {
        if self.signer_private_key.is_empty() {
            return Err(ConfigFileError::MissingField(format!(
                "{}.claiming.signerPrivateKey",
                section
            )));
        }
        if !self.profit_margin.is_finite() || self.profit_margin < 0.0 {
            return Err(ConfigFileError::InvalidValue(format!(
                "{}.claiming.profitMargin must be a non-negative number, got {}",
                section, self.profit_margin
            )));
        }
        if !(0.0..=100.0).contains(&self.gas_estimation_percentile) {
            return Err(ConfigFileError::InvalidValue(format!(
                "{}.claiming.gasEstimationPercentile must be within 0 and 100, got {}",
                section, self.gas_estimation_percentile
            )));
        }
        if self.message_submission_timeout == 0 {
            return Err(ConfigFileError::InvalidTimeout(self.message_submission_timeout));
        }
        if self.max_fee_per_gas_cap == 0 {
            return Err(ConfigFileError::InvalidValue(format!(
                "{}.claiming.maxFeePerGasCap must be greater than 0",
                section
            )));
        }
        if self.max_postman_sponsor_gas_limit.is_some() && !self.is_postman_sponsorship_enabled {
            return Err(ConfigFileError::InvalidValue(format!(
                "{}.claiming.maxPostmanSponsorGasLimit requires isPostmanSponsorshipEnabled",
                section
            )));
        }
        Ok(())
    }
}

/// One chain: where to read messages from and how to claim messages arriving on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub message_service_contract_address: Address,
    #[serde(rename = "isEOAEnabled", default = "default_true")]
    pub is_eoa_enabled: bool,
    #[serde(default)]
    pub is_calldata_enabled: bool,
    #[serde(default)]
    pub listener: ListenerConfig,
    pub claiming: ClaimingConfig,
    /// Only honoured on L2.
    #[serde(default)]
    pub enable_linea_estimate_gas: bool,
}

impl NetworkConfig {
    pub(super) fn validate(&self, section: &str) -> Result<(), ConfigFileError> {
        reqwest::Url::parse(&self.rpc_url).map_err(|e| {
            ConfigFileError::InvalidFormat(format!("{}.rpcUrl '{}': {}", section, self.rpc_url, e))
        })?;

        if self.message_service_contract_address == Address::ZERO {
            return Err(ConfigFileError::InvalidAddress(format!(
                "{}.messageServiceContractAddress cannot be the zero address",
                section
            )));
        }

        if self.listener.polling_interval == 0 || self.listener.receipt_polling_interval == 0 {
            return Err(ConfigFileError::InvalidTimeout(0));
        }
        if self.listener.max_fetch_messages_from_db == 0 || self.listener.max_blocks_to_fetch_logs == 0 {
            return Err(ConfigFileError::InvalidValue(format!(
                "{}.listener fetch limits must be greater than 0",
                section
            )));
        }

        if let Some(filter) = &self.listener.event_filters.calldata_filter {
            filter.compile()?;
        }

        self.claiming.validate(section)
    }
}
