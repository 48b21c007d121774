//! Property-based tests for claim pricing.
//!
//! `is_under_priced` compares `gasLimit * maxFeePerGas * profitMargin` with the message fee
//! using a fixed precision, `gas_estimation_threshold` is the fee paid per unit of gas.
use alloy::primitives::U256;
use postman_relayer::{
    models::GasFees,
    services::{gas_estimation_threshold, is_under_priced},
};
use proptest::{prelude::*, test_runner::Config};

proptest! {
  #![proptest_config(Config {
    cases: 1000, ..Config::default()
  })]

  /// With a margin of 1 a fee covering the exact cost is never underpriced, one wei less is
  #[test]
  fn prop_unit_margin_matches_exact_cost(
    gas_limit in 1u64..10_000_000,
    max_fee_per_gas in 1u128..1_000_000_000_000
  ) {
      let cost = U256::from(gas_limit) * U256::from(max_fee_per_gas);
      prop_assert!(!is_under_priced(gas_limit, max_fee_per_gas, 1.0, cost));
      prop_assert!(is_under_priced(gas_limit, max_fee_per_gas, 1.0, cost - U256::from(1u8)));
  }

  /// Raising the fee never turns a profitable message into an underpriced one
  #[test]
  fn prop_higher_fee_is_never_worse(
    gas_limit in 0u64..10_000_000,
    max_fee_per_gas in 0u128..1_000_000_000_000,
    margin in 0.0f64..10.0,
    fee in any::<u64>(),
    extra in any::<u64>()
  ) {
      let fee = U256::from(fee);
      if !is_under_priced(gas_limit, max_fee_per_gas, margin, fee) {
          prop_assert!(!is_under_priced(gas_limit, max_fee_per_gas, margin, fee + U256::from(extra)));
      }
  }

  /// A zero margin accepts every fee
  #[test]
  fn prop_zero_margin_is_never_underpriced(
    gas_limit in any::<u64>(),
    max_fee_per_gas in any::<u128>(),
    fee in any::<u64>()
  ) {
      prop_assert!(!is_under_priced(gas_limit, max_fee_per_gas, 0.0, U256::from(fee)));
  }

  /// The threshold times the gas limit never exceeds the fee and misses it by less than one unit
  #[test]
  fn prop_threshold_is_floor_division(
    fee in any::<u128>(),
    gas_limit in 1u64..u64::MAX
  ) {
      let fee = U256::from(fee);
      let threshold = gas_estimation_threshold(fee, gas_limit);
      let covered = threshold * U256::from(gas_limit);
      prop_assert!(covered <= fee);
      prop_assert!(fee - covered < U256::from(gas_limit));
  }

  /// Bumped fees are capped and never lower than the capped originals
  #[test]
  fn prop_bumped_fees_stay_under_cap(
    max_fee_per_gas in 0u128..1_000_000_000_000_000,
    max_priority_fee_per_gas in 0u128..1_000_000_000_000_000,
    percent in 0u128..200,
    cap in 1u128..1_000_000_000_000_000
  ) {
      let fees = GasFees { max_fee_per_gas, max_priority_fee_per_gas };
      let bumped = fees.bumped(percent, cap);
      let capped = fees.capped(cap);
      prop_assert!(bumped.max_fee_per_gas <= cap);
      prop_assert!(bumped.max_priority_fee_per_gas <= cap);
      prop_assert!(bumped.max_fee_per_gas >= capped.max_fee_per_gas);
      prop_assert!(bumped.max_priority_fee_per_gas >= capped.max_priority_fee_per_gas);
  }
}

#[test]
fn test_reference_values() {
    assert!(is_under_priced(50_000, 1, 1.0, U256::from(1u8)));
    assert!(!is_under_priced(
        50_000,
        1,
        1.0,
        U256::from(100_000_000_000_000_000_000u128)
    ));
    assert_eq!(
        gas_estimation_threshold(U256::from(1_000_000u64), 100_000),
        U256::from(10u8)
    );
    assert_eq!(gas_estimation_threshold(U256::from(1_000_000u64), 0), U256::ZERO);
}
