//! Raise, rescue, catch, throw and ensure across real method frames.

use std::cell::Cell;

use pretty_assertions::assert_eq;

use super::*;
use crate::environment::FrameKind;
use crate::method::Block;
use crate::unwind::Outcome;

/// Raises the exception stored in `$prepared`.
fn raise_prepared(rt: &mut Runtime, env: &EnvRef, _receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let name = rt.intern("$prepared");
    let exception = rt.globals().global_get(name);
    Err(rt.raise(env, exception))
}

fn boom(rt: &mut Runtime, env: &EnvRef, _receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let class = rt.builtins().runtime_error;
    Err(rt.raise_new(env, class, "boom"))
}

/// Calls `inner` on self.
fn relay(rt: &mut Runtime, env: &EnvRef, mut receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let inner = rt.intern("inner");
    rt.send(env, &mut receiver, inner, &[], None)
}

/// `rescue`s whatever `relay` lets through and returns the payload.
fn guarded(rt: &mut Runtime, env: &EnvRef, mut receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let relay = rt.intern("relay");
    match rt.rescue(env, |rt| rt.send(env, &mut receiver, relay, &[], None))? {
        Outcome::Completed(value) | Outcome::Rescued(value) => Ok(value),
    }
}

/// Block body: `throw tag, 7`.
fn throw_seven(rt: &mut Runtime, env: &EnvRef, mut receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let tag = args.first().cloned().unwrap_or_else(|| rt.nil());
    let throw = rt.intern("throw");
    rt.send(env, &mut receiver, throw, &[tag, Value::Integer(7)], None)
}

/// Block body: `throw :done, 1` from inside a `rescue`.
fn throw_through_rescue(rt: &mut Runtime, env: &EnvRef, mut receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let done = rt.intern("done");
    let tag = rt.symbol(done);
    let throw = rt.intern("throw");
    let outcome = rt.rescue(env, |rt| rt.send(env, &mut receiver, throw, &[tag, Value::Integer(1)], None))?;
    match outcome {
        Outcome::Completed(_) => Ok(Value::Integer(-1)),
        Outcome::Rescued(_) => Ok(Value::Integer(-2)),
    }
}

fn object_with(rt: &mut Runtime, methods: &[(&str, crate::MethodFn)]) -> Value {
    let c = class(rt, "Worker", None);
    for &(name, entry) in methods {
        define(rt, c, name, Arity::Exact(0), entry);
    }
    instance_of(rt, c)
}

fn kernel_send(rt: &mut Runtime, name: &str, args: &[Value], block: Option<&BlockRef>) -> RunResult {
    let env = rt.main_env().clone();
    let mut main = rt.main_object();
    let name = rt.intern(name);
    rt.send(&env, &mut main, name, args, block)
}

// === Raise and rescue ===

#[test]
fn rescue_receives_the_identical_exception_object() {
    let mut rt = Runtime::new();
    let original = Value::Object(rt.new_exception(rt.builtins().argument_error, "prepared"));
    let prepared = sym(&rt, "$prepared");
    rt.globals_mut().global_set(prepared, original.clone());
    let mut worker = object_with(&mut rt, &[("inner", raise_prepared), ("relay", relay), ("guarded", guarded)]);

    let payload = send(&mut rt, &mut worker, "guarded", &[]).unwrap();
    assert!(payload.same_object(&original));
    let last_error = rt.globals().global_get(sym(&rt, "$!"));
    assert!(last_error.same_object(&original));
    assert_eq!(rt.call_depth(), 0);
}

#[test]
fn unrescued_raise_reaches_the_caller_with_a_backtrace() {
    let mut rt = Runtime::new();
    let mut worker = object_with(&mut rt, &[("inner", boom), ("relay", relay)]);
    let err = send(&mut rt, &mut worker, "relay", &[]).unwrap_err();
    assert_eq!(
        describe_unwind(&rt, &err),
        ("RuntimeError".to_owned(), "boom".to_owned())
    );
    let backtrace = err.exception().and_then(|object| object.exception()).unwrap().backtrace();
    assert_eq!(
        backtrace,
        vec![
            "main:in 'inner'".to_owned(),
            "main:in 'relay'".to_owned(),
            "main:in '<main>'".to_owned(),
        ]
    );
}

#[test]
fn rescue_in_the_main_frame() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let mut worker = object_with(&mut rt, &[("inner", boom), ("relay", relay)]);
    let relay = sym(&rt, "relay");
    let outcome = rt
        .rescue(&env, |rt| rt.send(&env, &mut worker, relay, &[], None))
        .unwrap();
    let Outcome::Rescued(payload) = outcome else {
        panic!("expected a rescued outcome");
    };
    assert!(env.exception().unwrap().same_object(&payload));
    assert_eq!(rt.class_name(rt.class_of(&payload)), "RuntimeError");
}

// === Kernel#raise ===

#[test]
fn raise_builtin_forms() {
    let mut rt = Runtime::new();

    let message = rt.string("plain");
    let err = kernel_send(&mut rt, "raise", &[message], None).unwrap_err();
    assert_eq!(
        describe_unwind(&rt, &err),
        ("RuntimeError".to_owned(), "plain".to_owned())
    );

    let class = Value::Object(rt.modules().get(rt.builtins().argument_error).object().clone());
    let message = rt.string("typed");
    let err = kernel_send(&mut rt, "raise", &[class.clone(), message], None).unwrap_err();
    assert_eq!(
        describe_unwind(&rt, &err),
        ("ArgumentError".to_owned(), "typed".to_owned())
    );

    let err = kernel_send(&mut rt, "raise", &[class], None).unwrap_err();
    assert_eq!(
        describe_unwind(&rt, &err),
        ("ArgumentError".to_owned(), "ArgumentError".to_owned())
    );

    let err = kernel_send(&mut rt, "raise", &[], None).unwrap_err();
    assert_eq!(describe_unwind(&rt, &err).1, "unhandled exception");

    let err = kernel_send(&mut rt, "raise", &[Value::Integer(3)], None).unwrap_err();
    assert_eq!(
        describe_unwind(&rt, &err),
        ("TypeError".to_owned(), "exception class/object expected".to_owned())
    );
}

#[test]
fn raise_is_private() {
    let mut rt = Runtime::new();
    let mut main = rt.main_object();
    let err = public_send(&mut rt, &mut main, "raise", &[]).unwrap_err();
    assert_eq!(
        describe_unwind(&rt, &err),
        (
            "NoMethodError".to_owned(),
            "private method 'raise' called for an instance of Object".to_owned()
        )
    );
}

// === catch and throw ===

#[test]
fn catch_builtin_returns_the_thrown_value() {
    let mut rt = Runtime::new();
    let scope = rt.main_env().child(FrameKind::Block);
    let block = BlockRef::new(Block::new(throw_seven, scope, Arity::Exact(1), rt.main_object()));
    let result = kernel_send(&mut rt, "catch", &[], Some(&block)).unwrap();
    assert_eq!(result, Value::Integer(7));

    let tag = sym(&rt, "tag");
    let tag = rt.symbol(tag);
    let result = kernel_send(&mut rt, "catch", &[tag], Some(&block)).unwrap();
    assert_eq!(result, Value::Integer(7));
}

#[test]
fn throw_passes_through_rescue() {
    let mut rt = Runtime::new();
    let done = sym(&rt, "done");
    let done = rt.symbol(done);
    let scope = rt.main_env().child(FrameKind::Block);
    let block = BlockRef::new(Block::new(throw_through_rescue, scope, Arity::AtLeast(0), rt.main_object()));
    let result = kernel_send(&mut rt, "catch", &[done], Some(&block)).unwrap();
    assert_eq!(result, Value::Integer(1));
}

#[test]
fn throw_without_catch_raises() {
    let mut rt = Runtime::new();
    let missing = sym(&rt, "missing");
    let missing = rt.symbol(missing);
    let err = kernel_send(&mut rt, "throw", &[missing], None).unwrap_err();
    assert_eq!(
        describe_unwind(&rt, &err),
        ("UncaughtThrowError".to_owned(), "uncaught throw :missing".to_owned())
    );
}

#[test]
fn catch_without_block_raises() {
    let mut rt = Runtime::new();
    let err = kernel_send(&mut rt, "catch", &[], None).unwrap_err();
    assert_eq!(describe_unwind(&rt, &err).0, "LocalJumpError");
}

// === ensure ===

#[test]
fn ensure_runs_when_a_method_raises() {
    let mut rt = Runtime::new();
    let mut worker = object_with(&mut rt, &[("inner", boom)]);
    let inner = sym(&rt, "inner");
    let env = rt.main_env().clone();
    let ran = Cell::new(false);

    let result = rt.ensure(
        |rt| rt.send(&env, &mut worker, inner, &[], None),
        |_| {
            ran.set(true);
            Ok(())
        },
    );
    assert!(ran.get());
    assert_eq!(describe_unwind(&rt, &result.unwrap_err()).1, "boom");
}

// === Top level ===

#[test]
fn uncaught_exception_is_reported_at_the_boundary() {
    let mut rt = Runtime::builder().script_name("app.rb").build();
    let mut worker = object_with(&mut rt, &[("inner", boom), ("relay", relay)]);
    let relay = sym(&rt, "relay");
    let error = rt
        .run_main(|rt, env| rt.send(env, &mut worker, relay, &[], None))
        .unwrap_err();
    assert_eq!(error.class_name, "RuntimeError");
    assert_eq!(error.message, "boom");
    assert_eq!(error.backtrace.first().map(String::as_str), Some("app.rb:in 'inner'"));
    assert!(error.report().starts_with("app.rb:in 'inner': boom (RuntimeError)"));
}
