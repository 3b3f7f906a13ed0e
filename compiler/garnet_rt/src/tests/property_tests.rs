//! Randomized agreement between the fast path and full dispatch.

use proptest::prelude::*;

use super::*;
use crate::dispatch::Intrinsic;

/// Result of a send as comparable data: the value's rendering, or the
/// raised exception's class and message.
fn outcome(rt: &Runtime, result: &RunResult) -> Result<String, (String, String)> {
    match result {
        Ok(value) => Ok(rt.inspect(value)),
        Err(unwind) => Err(describe_unwind(rt, unwind)),
    }
}

fn compare(rt: &mut Runtime, op: Intrinsic, lhs: Value, rhs: Value) -> (Result<String, (String, String)>, Result<String, (String, String)>) {
    let env = rt.main_env().clone();
    let name = rt.names().selector(op);
    let mut immediate = lhs.clone();
    let mut boxed = lhs;
    boxed.hydrate(rt);

    let fast = rt.send(&env, &mut immediate, name, std::slice::from_ref(&rhs), None);
    let general = rt.send(&env, &mut boxed, name, std::slice::from_ref(&rhs), None);
    (outcome(rt, &fast), outcome(rt, &general))
}

fn integer_op() -> impl Strategy<Value = Intrinsic> {
    proptest::sample::select(Intrinsic::INTEGER.to_vec())
}

fn float_op() -> impl Strategy<Value = Intrinsic> {
    proptest::sample::select(Intrinsic::FLOAT.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    #[test]
    fn integer_fast_path_matches_dispatch(op in integer_op(), lhs in any::<i64>(), rhs in any::<i64>()) {
        let mut rt = Runtime::new();
        let (fast, general) = compare(&mut rt, op, Value::Integer(lhs), Value::Integer(rhs));
        prop_assert_eq!(fast, general, "{:?} {} {}", op, lhs, rhs);
    }

    #[test]
    fn small_integer_fast_path_matches_dispatch(op in integer_op(), lhs in -50i64..50, rhs in -5i64..5) {
        let mut rt = Runtime::new();
        let (fast, general) = compare(&mut rt, op, Value::Integer(lhs), Value::Integer(rhs));
        prop_assert_eq!(fast, general, "{:?} {} {}", op, lhs, rhs);
    }

    #[test]
    fn float_fast_path_matches_dispatch(op in float_op(), lhs in -1.0e6f64..1.0e6, rhs in -1.0e6f64..1.0e6) {
        let mut rt = Runtime::new();
        let (fast, general) = compare(&mut rt, op, Value::Float(lhs), Value::Float(rhs));
        prop_assert_eq!(fast, general, "{:?} {} {}", op, lhs, rhs);
    }

    #[test]
    fn mixed_operands_match_dispatch(op in integer_op(), lhs in -1000i64..1000, rhs in -1.0e3f64..1.0e3) {
        let mut rt = Runtime::new();
        let (fast, general) = compare(&mut rt, op, Value::Integer(lhs), Value::Float(rhs));
        prop_assert_eq!(fast, general, "{:?} {} {}", op, lhs, rhs);
    }

    #[test]
    fn hydration_is_idempotent(i in any::<i64>()) {
        let rt = Runtime::new();
        let mut value = Value::Integer(i);
        let first = value.hydrate(&rt);
        let second = value.hydrate(&rt);
        prop_assert!(crate::ObjectRef::ptr_eq(&first, &second));
        prop_assert_eq!(value.as_integer(), Some(i));
        prop_assert_eq!(rt.class_of(&value), rt.builtins().integer);
    }

    #[test]
    fn hydrated_floats_keep_their_bits(x in any::<f64>()) {
        let rt = Runtime::new();
        let mut value = Value::Float(x);
        value.hydrate(&rt);
        let back = value.as_float().unwrap_or(f64::NAN);
        prop_assert_eq!(back.to_bits(), x.to_bits());
    }
}
