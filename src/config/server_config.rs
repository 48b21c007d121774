/// Process-level configuration read from the environment.
use std::{env, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::constants::{
    DEFAULT_PROVIDER_MAX_RETRIES, DEFAULT_PROVIDER_RETRY_BASE_DELAY_MS,
    DEFAULT_PROVIDER_RETRY_MAX_DELAY_MS, DEFAULT_RPC_TIMEOUT_MS,
};

/// Backend holding the message store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RepositoryStorageType {
    InMemory,
    Redis,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The file path to the relayer configuration file.
    pub config_file_path: String,
    /// Which backend stores messages.
    pub storage_type: RepositoryStorageType,
    /// The URL for the Redis instance, required with the Redis backend.
    pub redis_url: Option<String>,
    /// Prefix of every Redis key written by this instance.
    pub redis_key_prefix: String,
    pub redis_connection_timeout_ms: u64,
    /// Timeout of a single RPC request.
    pub rpc_timeout_ms: u64,
    pub provider_max_retries: u8,
    pub provider_retry_base_delay_ms: u64,
    pub provider_retry_max_delay_ms: u64,
}

fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Creates a new `ServerConfig` instance from environment variables.
    ///
    /// # Defaults
    ///
    /// - `CONFIG_DIR` defaults to `"./config"` and `CONFIG_FILE_NAME` to `"config.json"`.
    /// - `STORAGE_TYPE` defaults to `in_memory`.
    /// - `REDIS_KEY_PREFIX` defaults to `"postman"`, `REDIS_CONNECTION_TIMEOUT_MS` to `5000`.
    /// - `RPC_TIMEOUT_MS` defaults to `10000`.
    /// - `PROVIDER_MAX_RETRIES` defaults to `3`, with delays between `100` and `2000` ms.
    pub fn from_env() -> Self {
        let conf_dir = env::var("CONFIG_DIR").unwrap_or_else(|_| "./config".to_string());
        let conf_dir = format!("{}/", conf_dir.trim_end_matches('/'));
        let config_file_name =
            env::var("CONFIG_FILE_NAME").unwrap_or_else(|_| "config.json".to_string());

        Self {
            config_file_path: format!("{}{}", conf_dir, config_file_name),
            storage_type: env::var("STORAGE_TYPE")
                .ok()
                .and_then(|v| RepositoryStorageType::from_str(&v.to_lowercase()).ok())
                .unwrap_or(RepositoryStorageType::InMemory),
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            redis_key_prefix: env::var("REDIS_KEY_PREFIX")
                .unwrap_or_else(|_| "postman".to_string()),
            redis_connection_timeout_ms: parse_or("REDIS_CONNECTION_TIMEOUT_MS", 5_000),
            rpc_timeout_ms: parse_or("RPC_TIMEOUT_MS", DEFAULT_RPC_TIMEOUT_MS),
            provider_max_retries: parse_or("PROVIDER_MAX_RETRIES", DEFAULT_PROVIDER_MAX_RETRIES),
            provider_retry_base_delay_ms: parse_or(
                "PROVIDER_RETRY_BASE_DELAY_MS",
                DEFAULT_PROVIDER_RETRY_BASE_DELAY_MS,
            ),
            provider_retry_max_delay_ms: parse_or(
                "PROVIDER_RETRY_MAX_DELAY_MS",
                DEFAULT_PROVIDER_RETRY_MAX_DELAY_MS,
            ),
        }
    }
}
