pub const DEFAULT_LISTENER_INTERVAL_MS: u64 = 4_000;
pub const DEFAULT_RECEIPT_POLLING_INTERVAL_MS: u64 = 6_000;
pub const DEFAULT_BLOCK_CONFIRMATION: u64 = 4;
pub const DEFAULT_MAX_FETCH_MESSAGES_FROM_DB: usize = 1_000;
pub const DEFAULT_MAX_BLOCKS_TO_FETCH_LOGS: u64 = 1_000;

pub const DEFAULT_DB_CLEANING_INTERVAL_MS: u64 = 43_200_000; // 12 hours
pub const DEFAULT_DB_DAYS_BEFORE_NOW_TO_DELETE: u64 = 14;
