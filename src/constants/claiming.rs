pub const DEFAULT_PROFIT_MARGIN: f64 = 1.0;
pub const DEFAULT_MAX_NUMBER_OF_RETRIES: u32 = 100;
pub const DEFAULT_RETRY_DELAY_IN_SECONDS: u64 = 30;
pub const DEFAULT_MESSAGE_SUBMISSION_TIMEOUT_MS: u64 = 300_000; // 5 minutes
pub const DEFAULT_MAX_NONCE_DIFF: u64 = 10_000;
pub const DEFAULT_MAX_CLAIM_GAS_LIMIT: u64 = 100_000;
pub const DEFAULT_MAX_TX_RETRIES: u32 = 20;
pub const DEFAULT_MAX_POSTMAN_SPONSOR_GAS_LIMIT: u64 = 250_000;

/// Fixed-point scale applied to the profit margin in the underpriced check.
pub const PROFIT_MARGIN_PRECISION: u64 = 1_000_000_000;

/// Fee raise applied on every claim resubmission.
pub const DEFAULT_PRICE_BUMP_PERCENT: u64 = 10;
