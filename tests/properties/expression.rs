//! Property-based tests for filter expressions.
//!
//! Comparisons and arithmetic on numbers read from the context must agree with plain
//! integer semantics.
use std::collections::BTreeMap;

use alloy::primitives::U256;
use postman_relayer::services::{Expression, Value};
use proptest::{prelude::*, test_runner::Config};

fn context(a: u64, b: u64) -> Value {
    let mut params = BTreeMap::new();
    params.insert("a".to_string(), Value::Number(U256::from(a)));
    params.insert("b".to_string(), Value::Number(U256::from(b)));
    let mut root = BTreeMap::new();
    root.insert("calldata".to_string(), Value::Object(params));
    Value::Object(root)
}

proptest! {
  #![proptest_config(Config {
    cases: 500, ..Config::default()
  })]

  #[test]
  fn prop_comparisons_follow_integers(a in any::<u64>(), b in any::<u64>()) {
      let ctx = context(a, b);
      let check = |source: &str| Expression::compile(source).unwrap().test(&ctx).unwrap();

      prop_assert_eq!(check("calldata.a < calldata.b"), a < b);
      prop_assert_eq!(check("calldata.a >= calldata.b"), a >= b);
      prop_assert_eq!(check("calldata.a == calldata.b"), a == b);
      prop_assert_eq!(check("not (calldata.a != calldata.b)"), a == b);
  }

  #[test]
  fn prop_sum_of_literals_matches(a in any::<u32>(), b in any::<u32>()) {
      let source = format!("calldata.a + calldata.b == {}", a as u64 + b as u64);
      let expression = Expression::compile(&source).unwrap();
      prop_assert!(expression.test(&context(a as u64, b as u64)).unwrap());
  }

  #[test]
  fn prop_boolean_connectives(a in any::<u64>(), b in any::<u64>(), bound in any::<u64>()) {
      let ctx = context(a, b);
      let source = format!("calldata.a > {} and calldata.b > {} or calldata.a == calldata.b", bound, bound);
      let expected = (a > bound && b > bound) || a == b;
      prop_assert_eq!(Expression::compile(&source).unwrap().test(&ctx).unwrap(), expected);
  }
}
