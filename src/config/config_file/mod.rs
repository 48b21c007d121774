//! JSON configuration file of the relayer.
//!
//! The file describes both chains and the switches of the two directions:
//!
//! ```json
//! {
//!   "l1": { "rpcUrl": "...", "messageServiceContractAddress": "0x...", "listener": {}, "claiming": {} },
//!   "l2": { "rpcUrl": "...", "messageServiceContractAddress": "0x...", "enableLineaEstimateGas": true, ... },
//!   "l1L2AutoClaimEnabled": true,
//!   "l2L1AutoClaimEnabled": false,
//!   "databaseCleaner": { "enabled": true }
//! }
//! ```
//!
//! The `claiming` section of a chain configures claims landing on that chain, i.e. the L2
//! section drives the L1 to L2 direction. Every field not shown above has a default and
//! [`load_config`] validates the whole file before anything is started.
use std::fs;

use serde::{Deserialize, Serialize};

use crate::{
    config::ConfigFileError,
    constants::{DEFAULT_DB_CLEANING_INTERVAL_MS, DEFAULT_DB_DAYS_BEFORE_NOW_TO_DELETE},
    domain::DatabaseCleanerConfig,
};

mod network;
pub use network::*;

fn default_cleaning_interval() -> u64 {
    DEFAULT_DB_CLEANING_INTERVAL_MS
}

fn default_days_before_now_to_delete() -> u64 {
    DEFAULT_DB_DAYS_BEFORE_NOW_TO_DELETE
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseCleanerFileConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cleaning_interval")]
    pub cleaning_interval: u64,
    #[serde(default = "default_days_before_now_to_delete")]
    pub days_before_now_to_delete: u64,
}

impl Default for DatabaseCleanerFileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cleaning_interval: DEFAULT_DB_CLEANING_INTERVAL_MS,
            days_before_now_to_delete: DEFAULT_DB_DAYS_BEFORE_NOW_TO_DELETE,
        }
    }
}

impl From<&DatabaseCleanerFileConfig> for DatabaseCleanerConfig {
    fn from(config: &DatabaseCleanerFileConfig) -> Self {
        DatabaseCleanerConfig {
            enabled: config.enabled,
            cleaning_interval_ms: config.cleaning_interval,
            days_before_now_to_delete: config.days_before_now_to_delete,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostmanConfig {
    pub l1: NetworkConfig,
    pub l2: NetworkConfig,
    #[serde(rename = "l1L2AutoClaimEnabled", default)]
    pub l1_l2_auto_claim_enabled: bool,
    #[serde(rename = "l2L1AutoClaimEnabled", default)]
    pub l2_l1_auto_claim_enabled: bool,
    #[serde(default)]
    pub database_cleaner: DatabaseCleanerFileConfig,
}

impl PostmanConfig {
    /// Validates both chain sections and the cleaner settings.
    ///
    /// # Errors
    /// Returns the first [`ConfigFileError`] found.
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        self.l1.validate("l1")?;
        self.l2.validate("l2")?;

        if self.database_cleaner.enabled {
            if self.database_cleaner.cleaning_interval == 0 {
                return Err(ConfigFileError::InvalidTimeout(0));
            }
            if self.database_cleaner.days_before_now_to_delete == 0 {
                return Err(ConfigFileError::InvalidValue(
                    "databaseCleaner.daysBeforeNowToDelete must be greater than 0".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Loads and validates the config file at `config_file_path`.
pub fn load_config(config_file_path: &str) -> Result<PostmanConfig, ConfigFileError> {
    let config_str = fs::read_to_string(config_file_path)?;
    let config: PostmanConfig = serde_json::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_MAX_FEE_PER_GAS_CAP, DEFAULT_MAX_POSTMAN_SPONSOR_GAS_LIMIT};
    use alloy::primitives::{address, Address};
    use serde_json::{json, Value};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn network(contract: &str) -> Value {
        json!({
            "rpcUrl": "http://localhost:8545",
            "messageServiceContractAddress": contract,
            "claiming": {
                "signerPrivateKey": {
                    "type": "plain",
                    "value": "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
                }
            }
        })
    }

    fn valid() -> Value {
        json!({
            "l1": network("0xd19d4B5d358258f05D7B411E21A1460D11B0876F"),
            "l2": network("0x508Ca82Df566dCD1B0DE8296e70a96332cD644ec"),
            "l1L2AutoClaimEnabled": true
        })
    }

    fn parse(value: Value) -> PostmanConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults_are_applied() {
        let config = parse(valid());
        config.validate().unwrap();

        assert!(config.l1_l2_auto_claim_enabled);
        assert!(!config.l2_l1_auto_claim_enabled);
        assert!(config.l1.is_eoa_enabled);
        assert!(!config.l1.is_calldata_enabled);
        assert!(!config.l2.enable_linea_estimate_gas);
        assert_eq!(config.l1.listener.polling_interval, 4_000);
        assert_eq!(config.l1.listener.block_confirmation, 4);
        assert_eq!(config.l1.listener.initial_from_block, None);
        assert_eq!(config.l2.claiming.max_fee_per_gas_cap, DEFAULT_MAX_FEE_PER_GAS_CAP);
        assert_eq!(config.l2.claiming.profit_margin, 1.0);
        assert_eq!(config.l2.claiming.max_tx_retries, 20);
        assert_eq!(config.l2.claiming.fee_recipient(), Address::ZERO);
        assert_eq!(
            config.l2.claiming.sponsor_gas_limit(),
            DEFAULT_MAX_POSTMAN_SPONSOR_GAS_LIMIT
        );
        assert!(!config.database_cleaner.enabled);
        assert_eq!(config.database_cleaner.days_before_now_to_delete, 14);
    }

    #[test]
    fn test_explicit_values_and_filters() {
        let mut value = valid();
        value["l2"]["enableLineaEstimateGas"] = json!(true);
        value["l1"]["isCalldataEnabled"] = json!(true);
        value["l1"]["listener"] = json!({
            "initialFromBlock": 19000000,
            "eventFilters": {
                "toAddressFilter": "0x5eeb45b5e6e3aa5b1d3b4c5d6e7f8091a2b3c4d5",
                "calldataFilter": {
                    "criteriaExpression": "calldata.funcSignature == \"0x6463fb2a\"",
                    "calldataFunctionInterface": "function claimMessageWithProof((bytes32[] proof,uint256 messageNumber,uint32 leafIndex,address from,address to,uint256 fee,uint256 value,address feeRecipient,bytes32 merkleRoot,bytes data) params)"
                }
            }
        });
        value["l2"]["claiming"]["maxFeePerGasCap"] = json!("250000000000");
        value["l2"]["claiming"]["feeRecipientAddress"] =
            json!("0x2c4c49d4ad2f5d6fd2e1ec4ab7a3e4d3b9ce1c1b");

        let config = parse(value);
        config.validate().unwrap();

        assert!(config.l2.enable_linea_estimate_gas);
        assert_eq!(config.l1.listener.initial_from_block, Some(19_000_000));
        assert_eq!(
            config.l1.listener.event_filters.to_address_filter,
            Some(address!("5eeb45b5e6e3aa5b1d3b4c5d6e7f8091a2b3c4d5"))
        );
        assert_eq!(config.l2.claiming.max_fee_per_gas_cap, 250_000_000_000);
        assert_eq!(
            config.l2.claiming.fee_recipient(),
            address!("2c4c49d4ad2f5d6fd2e1ec4ab7a3e4d3b9ce1c1b")
        );
    }

    #[test]
    fn test_malformed_address_fails_to_parse() {
        let mut value = valid();
        value["l1"]["messageServiceContractAddress"] = json!("0x1234");
        assert!(serde_json::from_value::<PostmanConfig>(value).is_err());
    }

    #[test]
    fn test_zero_contract_address_is_rejected() {
        let mut value = valid();
        value["l2"]["messageServiceContractAddress"] =
            json!("0x0000000000000000000000000000000000000000");
        assert!(matches!(
            parse(value).validate(),
            Err(ConfigFileError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_zero_polling_interval_is_rejected() {
        let mut value = valid();
        value["l1"]["listener"] = json!({ "pollingInterval": 0 });
        assert!(matches!(
            parse(value).validate(),
            Err(ConfigFileError::InvalidTimeout(0))
        ));
    }

    #[test]
    fn test_negative_profit_margin_is_rejected() {
        let mut value = valid();
        value["l2"]["claiming"]["profitMargin"] = json!(-0.5);
        assert!(matches!(
            parse(value).validate(),
            Err(ConfigFileError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_sponsor_limit_requires_sponsorship() {
        let mut value = valid();
        value["l2"]["claiming"]["maxPostmanSponsorGasLimit"] = json!(300000);
        assert!(matches!(
            parse(value.clone()).validate(),
            Err(ConfigFileError::InvalidValue(_))
        ));

        value["l2"]["claiming"]["isPostmanSponsorshipEnabled"] = json!(true);
        let config = parse(value);
        config.validate().unwrap();
        assert_eq!(config.l2.claiming.sponsor_gas_limit(), 300_000);
    }

    #[test]
    fn test_unparsable_calldata_filter_is_rejected() {
        let mut value = valid();
        value["l1"]["listener"] = json!({
            "eventFilters": {
                "calldataFilter": {
                    "criteriaExpression": "calldata.funcSignature ==",
                    "calldataFunctionInterface": "function foo(uint256 a)"
                }
            }
        });
        assert!(matches!(
            parse(value).validate(),
            Err(ConfigFileError::InvalidCalldataFilter(_))
        ));
    }

    #[test]
    fn test_bad_rpc_url_is_rejected() {
        let mut value = valid();
        value["l1"]["rpcUrl"] = json!("not a url");
        assert!(matches!(
            parse(value).validate(),
            Err(ConfigFileError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", valid()).unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(
            config.l2.message_service_contract_address,
            address!("508ca82df566dcd1b0de8296e70a96332cd644ec")
        );
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(matches!(
            load_config("/nonexistent/postman/config.json"),
            Err(ConfigFileError::IoError(_))
        ));
    }
}
