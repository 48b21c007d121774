//! Property-based tests for logging.
//!
//! These tests verify the behavior of the `rolled_file_name` function, focusing on the
//! `.log` suffix handling and the shape of the produced name.
//!
//!   Refer to `src/logging/mod.rs` for more details.
use postman_relayer::logging::rolled_file_name;
use proptest::{prelude::*, test_runner::Config};

proptest! {
  #![proptest_config(Config {
    cases: 1000, ..Config::default()
  })]

  /// A base ending with ".log" keeps a single ".log" suffix
  #[test]
  fn prop_rolled_file_name_with_log_suffix(
    base in ".*[^.]",
    date in "[0-9]{4}-[0-9]{2}-[0-9]{2}",
    index in 1u32..10_000
  ) {
      let base_with_log = format!("{}.log", base);
      let result = rolled_file_name(&base_with_log, &date, index);
      let expected = format!("{}-{}.{}.log", base, date, index);
      prop_assert_eq!(result, expected);
  }

  /// Any other base gets the suffix appended
  #[test]
  fn prop_rolled_file_name_without_log_suffix(
    base in ".*",
    date in "[0-9]{4}-[0-9]{2}-[0-9]{2}",
    index in 1u32..10_000
  ) {
      let base_non_log = if base.ends_with(".log") {
        format!("{}x", base)
      } else {
        base
      };
      let result = rolled_file_name(&base_non_log, &date, index);
      let expected = format!("{}-{}.{}.log", base_non_log, date, index);
      prop_assert_eq!(result, expected);
  }
}
