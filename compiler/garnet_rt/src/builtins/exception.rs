//! `Exception`.

use super::string_arg;
use crate::environment::EnvRef;
use crate::errors;
use crate::method::{Arity, BlockRef};
use crate::runtime::Runtime;
use crate::unwind::RunResult;
use crate::value::Value;

pub(super) fn install(rt: &mut Runtime) {
    let exception = rt.builtins().exception;
    rt.define_native(exception, "initialize", Arity::Range(0, 1), initialize);
    rt.define_native(exception, "message", Arity::Exact(0), message);
    rt.define_native(exception, "to_s", Arity::Exact(0), message);
    rt.define_native(exception, "backtrace", Arity::Exact(0), backtrace);
}

/// `Exception.new(message = nil)`; without a message the class name stands in.
fn initialize(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let Some(data) = receiver.as_reference().and_then(|object| object.exception()) else {
        return Err(errors::type_error(rt, env, "not an exception"));
    };
    if let Some(message) = args.first().filter(|message| !message.is_nil()) {
        data.set_message(string_arg(rt, message));
    }
    Ok(rt.nil())
}

fn message(rt: &mut Runtime, env: &EnvRef, receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    match receiver.as_reference().and_then(|object| object.exception()) {
        Some(data) => Ok(rt.string(&data.message())),
        None => Err(errors::type_error(rt, env, "not an exception")),
    }
}

/// Backtrace lines joined by newlines, or `nil` before the first raise.
fn backtrace(rt: &mut Runtime, env: &EnvRef, receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let Some(data) = receiver.as_reference().and_then(|object| object.exception()) else {
        return Err(errors::type_error(rt, env, "not an exception"));
    };
    if !data.has_backtrace() {
        return Ok(rt.nil());
    }
    Ok(rt.string(&data.backtrace().join("\n")))
}
