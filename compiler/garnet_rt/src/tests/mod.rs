//! Scenario tests across modules, plus helpers shared with the unit tests.
//!
//! The native functions below stand in for compiled method bodies: they use
//! the same `MethodFn` calling convention a code generator targets.

mod property_tests;
mod unwind_tests;

use garnet_ir::Name;

use crate::method::{Arity, BlockRef, Method, MethodRef};
use crate::module::ModuleId;
use crate::runtime::Runtime;
use crate::unwind::{RunResult, Unwind};
use crate::value::Value;
use crate::EnvRef;

pub(crate) fn sym(rt: &Runtime, text: &str) -> Name {
    rt.intern(text)
}

/// Class name and message of a raised exception.
///
/// # Panics
/// Panics if `unwind` is a throw.
pub(crate) fn describe_unwind(rt: &Runtime, unwind: &Unwind) -> (String, String) {
    let exception = unwind.exception().expect("expected a raise, got a throw");
    let message = exception
        .exception()
        .map(crate::ExceptionData::message)
        .unwrap_or_default();
    (rt.class_name(exception.class()), message)
}

/// Install a native method and return it.
pub(crate) fn define(rt: &mut Runtime, owner: ModuleId, name: &str, arity: Arity, entry: crate::MethodFn) -> MethodRef {
    let name = rt.intern(name);
    rt.define_method(Method::native(name, owner, arity, entry))
}

/// Send with no block from the main frame.
pub(crate) fn send(rt: &mut Runtime, receiver: &mut Value, name: &str, args: &[Value]) -> RunResult {
    let env = rt.main_env().clone();
    let name = rt.intern(name);
    rt.send(&env, receiver, name, args, None)
}

pub(crate) fn public_send(rt: &mut Runtime, receiver: &mut Value, name: &str, args: &[Value]) -> RunResult {
    let env = rt.main_env().clone();
    let name = rt.intern(name);
    rt.public_send(&env, receiver, name, args, None)
}

/// `Class.new` on a fresh user class.
pub(crate) fn instance_of(rt: &mut Runtime, class: ModuleId) -> Value {
    let mut class_object = Value::Object(rt.modules().get(class).object().clone());
    send(rt, &mut class_object, "new", &[]).expect("Class#new")
}

/// `class Name < superclass; end` at top level.
pub(crate) fn class(rt: &mut Runtime, name: &str, superclass: Option<ModuleId>) -> ModuleId {
    let env = rt.main_env().clone();
    let name = rt.intern(name);
    rt.define_class(&env, name, superclass).expect("define_class")
}

pub(crate) fn module(rt: &mut Runtime, name: &str) -> ModuleId {
    let env = rt.main_env().clone();
    let name = rt.intern(name);
    rt.define_module(&env, name).expect("define_module")
}

// Bodies returning a fixed marker, to tell definitions apart.

pub(crate) fn returns_a(_rt: &mut Runtime, _env: &EnvRef, _receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    Ok(Value::Integer(1))
}

pub(crate) fn returns_b(_rt: &mut Runtime, _env: &EnvRef, _receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    Ok(Value::Integer(2))
}

pub(crate) fn returns_c(_rt: &mut Runtime, _env: &EnvRef, _receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    Ok(Value::Integer(3))
}

pub(crate) fn returns_m(_rt: &mut Runtime, _env: &EnvRef, _receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    Ok(Value::Integer(100))
}

pub(crate) fn returns_self(_rt: &mut Runtime, _env: &EnvRef, receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    Ok(receiver)
}
