pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_PROVIDER_MAX_RETRIES: u8 = 3;
pub const DEFAULT_PROVIDER_RETRY_BASE_DELAY_MS: u64 = 100;
pub const DEFAULT_PROVIDER_RETRY_MAX_DELAY_MS: u64 = 2_000;

/// Jitter applied to retry delays, as a fraction of the delay.
pub const RETRY_JITTER_PERCENT: f64 = 0.2;
