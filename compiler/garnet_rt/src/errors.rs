//! Error construction.
//!
//! Runtime errors are ordinary exception objects delivered through the
//! unwind mechanism. The factories here build the message, pick the class
//! and raise from the given frame; each returns the `Unwind` so call sites
//! read `return Err(errors::type_error(rt, env, ...))`.
//!
//! Host-level failures that never become Ruby-visible exceptions use
//! `thiserror` enums: `UncaughtException` and `ConfigError`.

use std::fmt::Write as _;

use garnet_ir::Name;

use crate::environment::EnvRef;
use crate::method::Arity;
use crate::runtime::Runtime;
use crate::unwind::Unwind;
use crate::value::Value;

/// An exception that escaped the top-level frame.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({class_name})")]
pub struct UncaughtException {
    pub class_name: String,
    pub message: String,
    /// Innermost frame first.
    pub backtrace: Vec<String>,
}

impl UncaughtException {
    /// Render the way an interpreter reports a fatal exception.
    pub fn report(&self) -> String {
        let mut frames = self.backtrace.iter();
        let mut out = match frames.next() {
            Some(first) => format!("{first}: {} ({})", self.message, self.class_name),
            None => format!("{} ({})", self.message, self.class_name),
        };
        for frame in frames {
            let _ = write!(out, "\n\tfrom {frame}");
        }
        out
    }
}

/// Malformed runtime configuration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} (expected {expected})")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[cold]
pub fn runtime_error(rt: &mut Runtime, env: &EnvRef, message: impl Into<String>) -> Unwind {
    let class = rt.builtins().runtime_error;
    rt.raise_new(env, class, message)
}

#[cold]
pub fn type_error(rt: &mut Runtime, env: &EnvRef, message: impl Into<String>) -> Unwind {
    let class = rt.builtins().type_error;
    rt.raise_new(env, class, message)
}

#[cold]
pub fn argument_error(rt: &mut Runtime, env: &EnvRef, message: impl Into<String>) -> Unwind {
    let class = rt.builtins().argument_error;
    rt.raise_new(env, class, message)
}

#[cold]
pub fn wrong_arity(rt: &mut Runtime, env: &EnvRef, given: usize, expected: Arity) -> Unwind {
    argument_error(
        rt,
        env,
        format!("wrong number of arguments (given {given}, expected {expected})"),
    )
}

/// `NameError` carrying the offending name.
#[cold]
pub fn name_error(rt: &mut Runtime, env: &EnvRef, message: impl Into<String>, name: Name) -> Unwind {
    let class = rt.builtins().name_error;
    raise_with_name(rt, env, class, message.into(), name)
}

#[cold]
pub fn invalid_ivar_name(rt: &mut Runtime, env: &EnvRef, name: Name) -> Unwind {
    let message = format!("'{}' is not allowed as an instance variable name", rt.name_str(name));
    name_error(rt, env, message, name)
}

/// `NoMethodError` carrying the selector.
#[cold]
pub fn no_method_error(rt: &mut Runtime, env: &EnvRef, message: impl Into<String>, name: Name) -> Unwind {
    let class = rt.builtins().no_method_error;
    raise_with_name(rt, env, class, message.into(), name)
}

/// Invoking an `undef_method` placeholder directly.
#[cold]
pub fn undefined_method_called(rt: &mut Runtime, env: &EnvRef, name: Name, receiver: &Value) -> Unwind {
    let message = format!(
        "undefined method '{}' for {}",
        rt.name_str(name),
        rt.describe_receiver(receiver)
    );
    no_method_error(rt, env, message, name)
}

#[cold]
pub fn zero_division(rt: &mut Runtime, env: &EnvRef) -> Unwind {
    let class = rt.builtins().zero_division_error;
    rt.raise_new(env, class, "divided by 0")
}

/// Integer arithmetic left the 64-bit range.
#[cold]
pub fn integer_overflow(rt: &mut Runtime, env: &EnvRef) -> Unwind {
    let class = rt.builtins().range_error;
    rt.raise_new(env, class, "integer overflow")
}

#[cold]
pub fn stack_too_deep(rt: &mut Runtime, env: &EnvRef) -> Unwind {
    let class = rt.builtins().system_stack_error;
    rt.raise_new(env, class, "stack level too deep")
}

#[cold]
pub fn frozen_error(rt: &mut Runtime, env: &EnvRef, receiver: &Value) -> Unwind {
    let message = format!("can't modify frozen {}: {}", rt.class_name(rt.class_of(receiver)), rt.inspect(receiver));
    let class = rt.builtins().frozen_error;
    rt.raise_new(env, class, message)
}

fn raise_with_name(
    rt: &mut Runtime,
    env: &EnvRef,
    class: crate::module::ModuleId,
    message: String,
    name: Name,
) -> Unwind {
    let exception = rt.new_exception(class, message);
    if let Some(data) = exception.exception() {
        data.set_name(name);
    }
    rt.raise(env, Value::Object(exception))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
