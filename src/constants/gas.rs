pub const DEFAULT_MAX_FEE_PER_GAS_CAP: u128 = 100_000_000_000; // 100 gwei
pub const DEFAULT_GAS_ESTIMATION_PERCENTILE: f64 = 20.0;
pub const FEE_HISTORY_BLOCK_COUNT: u64 = 10;

/// Margin applied to the Linea variable-cost fee: 6/5 = 1.2
pub const LINEA_FEE_MARGIN_NUMERATOR: u128 = 6;
pub const LINEA_FEE_MARGIN_DENOMINATOR: u128 = 5;
