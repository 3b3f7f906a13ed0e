//! Core protocol methods.
//!
//! Only the methods the dispatch core itself leans on: object identity and
//! reflection, `send`/`public_send`, `raise`, `catch`/`throw`, class
//! instantiation, module maintenance and the numeric operators behind the
//! fast path. The rest of the standard library is a client of the dispatch
//! engine and lives elsewhere.

mod exception;
mod kernel;
mod module;
mod numeric;

use garnet_ir::Name;

use crate::environment::EnvRef;
use crate::errors;
use crate::heap::ObjectKind;
use crate::module::ModuleId;
use crate::runtime::Runtime;
use crate::unwind::RunResult;
use crate::value::Value;

/// Install every core method. Called once, at the end of bootstrap.
pub(crate) fn install(rt: &mut Runtime) {
    kernel::install(rt);
    module::install(rt);
    numeric::install(rt);
    exception::install(rt);
}

/// A method-name argument: a Symbol, or a String to intern.
fn selector_arg(rt: &mut Runtime, env: &EnvRef, value: &Value) -> RunResult<Name> {
    if let Some(name) = value.as_symbol() {
        return Ok(name);
    }
    if let Some(ObjectKind::String(text)) = value.as_reference().map(|object| object.kind()) {
        let text = text.borrow().clone();
        return Ok(rt.intern(&text));
    }
    let message = format!("{} is not a symbol nor a string", rt.inspect(value));
    Err(errors::type_error(rt, env, message))
}

/// The module a receiver stands for; native `Module` methods only run on
/// class and module objects.
fn receiver_module(rt: &mut Runtime, env: &EnvRef, receiver: &Value) -> RunResult<ModuleId> {
    match rt.module_of(receiver) {
        Some(id) => Ok(id),
        None => {
            let message = format!("{} is not a class/module", rt.inspect(receiver));
            Err(errors::type_error(rt, env, message))
        }
    }
}

/// Text of a String argument, or its `inspect` for anything else.
fn string_arg(rt: &Runtime, value: &Value) -> String {
    match value.as_reference().map(|object| object.kind()) {
        Some(ObjectKind::String(text)) => text.borrow().clone(),
        _ => rt.inspect(value),
    }
}
