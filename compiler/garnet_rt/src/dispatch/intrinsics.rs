//! Numeric operators that can run on immediates.
//!
//! `apply` is the single implementation of each operator. The dispatch fast
//! path calls it directly on immediate operands; the `Integer`/`Float`
//! methods installed at bootstrap call it on hydrated receivers. Sharing the
//! code is what keeps the two paths in agreement.

use std::cmp::Ordering;

use crate::environment::EnvRef;
use crate::errors;
use crate::method::{Arity, BlockRef, MethodFn};
use crate::runtime::Runtime;
use crate::unwind::RunResult;
use crate::value::Value;

/// A fast-path operator tag carried by the numeric builtin methods.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Cmp,
}

impl Intrinsic {
    pub const INTEGER: [Intrinsic; 11] = [
        Intrinsic::Add,
        Intrinsic::Sub,
        Intrinsic::Mul,
        Intrinsic::Div,
        Intrinsic::Mod,
        Intrinsic::Lt,
        Intrinsic::Le,
        Intrinsic::Gt,
        Intrinsic::Ge,
        Intrinsic::Eq,
        Intrinsic::Cmp,
    ];

    /// Float has no `%` on the fast path.
    pub const FLOAT: [Intrinsic; 10] = [
        Intrinsic::Add,
        Intrinsic::Sub,
        Intrinsic::Mul,
        Intrinsic::Div,
        Intrinsic::Lt,
        Intrinsic::Le,
        Intrinsic::Gt,
        Intrinsic::Ge,
        Intrinsic::Eq,
        Intrinsic::Cmp,
    ];

    fn is_comparison(self) -> bool {
        matches!(
            self,
            Intrinsic::Lt | Intrinsic::Le | Intrinsic::Gt | Intrinsic::Ge
        )
    }
}

#[derive(Copy, Clone, Debug)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        value
            .as_integer()
            .map(Num::Int)
            .or_else(|| value.as_float().map(Num::Float))
    }

    #[allow(
        clippy::cast_precision_loss,
        reason = "mixed Integer/Float arithmetic converts to Float"
    )]
    fn to_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(x) => x,
        }
    }

    fn class_name(self) -> &'static str {
        match self {
            Num::Int(_) => "Integer",
            Num::Float(_) => "Float",
        }
    }
}

fn ordering_value(ordering: Ordering) -> Value {
    Value::Integer(match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

/// Evaluate `lhs op rhs`.
///
/// Integer results stay immediate; arithmetic mixing Integer and Float
/// produces a Float.
pub(crate) fn apply(rt: &mut Runtime, env: &EnvRef, op: Intrinsic, lhs: &Value, rhs: &Value) -> RunResult {
    let Some(left) = Num::of(lhs) else {
        let message = format!("{} is not a number", rt.inspect(lhs));
        return Err(errors::type_error(rt, env, message));
    };
    let Some(right) = Num::of(rhs) else {
        return non_numeric(rt, env, op, left, rhs);
    };
    match (left, right) {
        (Num::Int(a), Num::Int(b)) => integer_op(rt, env, op, a, b),
        (a, b) => Ok(float_op(rt, op, a.to_f64(), b.to_f64())),
    }
}

fn integer_op(rt: &mut Runtime, env: &EnvRef, op: Intrinsic, a: i64, b: i64) -> RunResult {
    let checked = match op {
        Intrinsic::Add => a.checked_add(b),
        Intrinsic::Sub => a.checked_sub(b),
        Intrinsic::Mul => a.checked_mul(b),
        Intrinsic::Div => {
            if b == 0 {
                return Err(errors::zero_division(rt, env));
            }
            floor_div(a, b)
        }
        Intrinsic::Mod => {
            if b == 0 {
                return Err(errors::zero_division(rt, env));
            }
            Some(floor_mod(a, b))
        }
        Intrinsic::Lt => return Ok(rt.bool_value(a < b)),
        Intrinsic::Le => return Ok(rt.bool_value(a <= b)),
        Intrinsic::Gt => return Ok(rt.bool_value(a > b)),
        Intrinsic::Ge => return Ok(rt.bool_value(a >= b)),
        Intrinsic::Eq => return Ok(rt.bool_value(a == b)),
        Intrinsic::Cmp => return Ok(ordering_value(a.cmp(&b))),
    };
    checked
        .map(Value::Integer)
        .ok_or_else(|| errors::integer_overflow(rt, env))
}

/// Division rounding toward negative infinity.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let quotient = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

/// Remainder with the sign of the divisor.
fn floor_mod(a: i64, b: i64) -> i64 {
    let remainder = a.wrapping_rem(b);
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        remainder + b
    } else {
        remainder
    }
}

fn float_op(rt: &Runtime, op: Intrinsic, a: f64, b: f64) -> Value {
    match op {
        Intrinsic::Add => Value::Float(a + b),
        Intrinsic::Sub => Value::Float(a - b),
        Intrinsic::Mul => Value::Float(a * b),
        Intrinsic::Div => Value::Float(a / b),
        Intrinsic::Mod => {
            let remainder = a % b;
            if remainder != 0.0 && ((remainder < 0.0) != (b < 0.0)) {
                Value::Float(remainder + b)
            } else {
                Value::Float(remainder)
            }
        }
        Intrinsic::Lt => rt.bool_value(a < b),
        Intrinsic::Le => rt.bool_value(a <= b),
        Intrinsic::Gt => rt.bool_value(a > b),
        Intrinsic::Ge => rt.bool_value(a >= b),
        #[allow(clippy::float_cmp, reason = "Float#== is exact comparison")]
        Intrinsic::Eq => rt.bool_value(a == b),
        Intrinsic::Cmp => a.partial_cmp(&b).map_or_else(|| rt.nil(), ordering_value),
    }
}

/// Right operand is not a number.
#[cold]
fn non_numeric(rt: &mut Runtime, env: &EnvRef, op: Intrinsic, left: Num, rhs: &Value) -> RunResult {
    match op {
        Intrinsic::Eq => Ok(rt.bool_value(false)),
        Intrinsic::Cmp => Ok(rt.nil()),
        _ if op.is_comparison() => {
            let message = format!(
                "comparison of {} with {} failed",
                left.class_name(),
                rt.describe_operand(rhs)
            );
            Err(errors::argument_error(rt, env, message))
        }
        _ => {
            let message = format!(
                "{} can't be coerced into {}",
                rt.describe_operand(rhs),
                left.class_name()
            );
            Err(errors::type_error(rt, env, message))
        }
    }
}

macro_rules! intrinsic_methods {
    ($($entry:ident => $op:ident),* $(,)?) => {
        $(
            fn $entry(
                rt: &mut Runtime,
                env: &EnvRef,
                receiver: Value,
                args: &[Value],
                _block: Option<&BlockRef>,
            ) -> RunResult {
                match args {
                    [rhs] => apply(rt, env, Intrinsic::$op, &receiver, rhs),
                    _ => Err(errors::wrong_arity(rt, env, args.len(), Arity::Exact(1))),
                }
            }
        )*

        /// Native method body for an operator.
        pub(crate) fn native_entry(op: Intrinsic) -> MethodFn {
            match op {
                $(Intrinsic::$op => $entry as MethodFn,)*
            }
        }
    };
}

intrinsic_methods! {
    numeric_add => Add,
    numeric_sub => Sub,
    numeric_mul => Mul,
    numeric_div => Div,
    numeric_mod => Mod,
    numeric_lt => Lt,
    numeric_le => Le,
    numeric_gt => Gt,
    numeric_ge => Ge,
    numeric_eq => Eq,
    numeric_cmp => Cmp,
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
