use pretty_assertions::assert_eq;

use super::*;
use crate::method::{Arity, BlockRef, Method, MethodRef};
use crate::tests::describe_unwind;

fn raise_runtime_error(rt: &mut Runtime, env: &EnvRef, _receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let class = rt.builtins().runtime_error;
    Err(rt.raise_new(env, class, "boom"))
}

fn throw_first_arg(rt: &mut Runtime, env: &EnvRef, _receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    Err(rt.throw(env, args[0].clone(), Value::Integer(42)))
}

fn method(rt: &Runtime, name: &str, entry: crate::method::MethodFn) -> MethodRef {
    let object = rt.builtins().object;
    MethodRef::new(Method::native(rt.intern(name), object, Arity::AtLeast(0), entry))
}

// === Raise ===

#[test]
fn raise_non_exception_is_a_type_error() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let err = rt.raise(&env, Value::Integer(1));
    assert_eq!(
        describe_unwind(&rt, &err),
        ("TypeError".to_owned(), "exception class/object expected".to_owned())
    );
}

#[test]
fn raise_without_handler_has_no_target() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let class = rt.builtins().runtime_error;
    match rt.raise_new(&env, class, "x") {
        Unwind::Raise(raised) => assert_eq!(raised.target, None),
        Unwind::Throw(_) => panic!("expected a raise"),
    }
}

#[test]
fn first_raise_records_backtrace_and_reraise_keeps_it() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let class = rt.builtins().runtime_error;
    let exception = rt.new_exception(class, "x");
    rt.raise(&env, Value::Object(exception.clone()));
    let first = exception.exception().unwrap().backtrace();
    assert_eq!(first, vec!["main:in '<main>'".to_owned()]);

    let inner = env.child(crate::environment::FrameKind::Block);
    inner.set_caller(&env);
    rt.raise(&inner, Value::Object(exception.clone()));
    assert_eq!(exception.exception().unwrap().backtrace(), first);
}

// === Rescue ===

#[test]
fn rescue_completes_without_a_raise() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let outcome = rt.rescue(&env, |_| Ok(Value::Integer(5))).unwrap();
    assert!(matches!(outcome, Outcome::Completed(Value::Integer(5))));
    assert!(!env.is_unwind_target());
}

#[test]
fn rescue_receives_exception_from_a_callee() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let raiser = method(&rt, "explode", raise_runtime_error);
    let main = rt.main_object();

    let outcome = rt
        .rescue(&env, |rt| raiser.invoke(rt, &env, main, &[], None))
        .unwrap();
    let Outcome::Rescued(payload) = outcome else {
        panic!("expected a rescue");
    };
    assert!(rt.is_exception(&payload));
    assert!(env.exception().is_some_and(|e| e.same_object(&payload)));
    let last_error = rt.names().last_error;
    assert!(rt.globals().global_get(last_error).same_object(&payload));
}

#[test]
fn inner_rescue_claims_before_outer() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let inner_env = env.child(crate::environment::FrameKind::Block);
    inner_env.set_caller(&env);
    let raiser = method(&rt, "explode", raise_runtime_error);
    let main = rt.main_object();

    let outer = rt
        .rescue(&env, |rt| {
            let inner = rt.rescue(&inner_env, |rt| raiser.invoke(rt, &inner_env, main, &[], None))?;
            assert!(matches!(inner, Outcome::Rescued(_)));
            Ok(Value::Integer(1))
        })
        .unwrap();
    assert!(matches!(outer, Outcome::Completed(Value::Integer(1))));
}

// === Catch / throw ===

#[test]
fn throw_returns_value_from_matching_catch() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let thrower = method(&rt, "thrower", throw_first_arg);
    let name = rt.intern("done");
    let tag = rt.symbol(name);
    let main = rt.main_object();

    let value = rt
        .catch(&env, tag, |rt, tag| thrower.invoke(rt, &env, main, std::slice::from_ref(tag), None))
        .unwrap();
    assert_eq!(value, Value::Integer(42));
    assert!(!env.is_unwind_target());
}

#[test]
fn throw_passes_non_matching_catch() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let inner_env = env.child(crate::environment::FrameKind::Block);
    inner_env.set_caller(&env);
    let outer_tag = rt.symbol(rt.intern("outer"));
    let inner_tag = rt.symbol(rt.intern("inner"));

    let result = rt.catch(&env, outer_tag.clone(), |rt, _| {
        rt.catch(&inner_env, inner_tag, |rt, _| {
            Err(rt.throw(&inner_env, outer_tag.clone(), Value::Integer(7)))
        })?;
        Ok(Value::Integer(0))
    });
    assert_eq!(result.unwrap(), Value::Integer(7));
}

#[test]
fn throw_without_catch_raises_uncaught_throw_error() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let tag = rt.symbol(rt.intern("nowhere"));
    let err = rt.throw(&env, tag, Value::Integer(1));
    assert_eq!(
        describe_unwind(&rt, &err),
        ("UncaughtThrowError".to_owned(), "uncaught throw :nowhere".to_owned())
    );
}

#[test]
fn catch_does_not_intercept_raises() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let class = rt.builtins().runtime_error;
    let result = rt.catch(&env, Value::Integer(1), |rt, _| Err(rt.raise_new(&env, class, "x")));
    assert!(result.is_err_and(|err| err.exception().is_some()));
}

// === Ensure ===

#[test]
fn ensure_runs_cleanup_on_error_and_preserves_it() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let flag = rt.intern("cleaned");
    let class = rt.builtins().runtime_error;

    let result: RunResult = rt.ensure(
        |rt| Err(rt.raise_new(&env, class, "body failed")),
        |_| {
            env.define(flag, Value::Integer(1));
            Ok(())
        },
    );
    assert_eq!(describe_unwind(&rt, &result.unwrap_err()).1, "body failed");
    assert_eq!(env.lookup_local(flag), Some(Value::Integer(1)));
}

#[test]
fn ensure_cleanup_error_replaces_body_result() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let class = rt.builtins().runtime_error;
    let result = rt.ensure(
        |_| Ok(Value::Integer(1)),
        |rt| Err(rt.raise_new(&env, class, "cleanup failed")),
    );
    assert_eq!(describe_unwind(&rt, &result.unwrap_err()).1, "cleanup failed");
}

// === Top level ===

#[test]
fn run_main_reports_escaping_exception() {
    let mut rt = Runtime::builder().script_name("app.rb").build();
    let err = rt
        .run_main(|rt, env| {
            let class = rt.builtins().argument_error;
            Err(rt.raise_new(env, class, "bad"))
        })
        .unwrap_err();
    assert_eq!(err.class_name, "ArgumentError");
    assert_eq!(err.message, "bad");
    assert_eq!(err.backtrace, vec!["app.rb:in '<main>'".to_owned()]);
    assert_eq!(err.report(), "app.rb:in '<main>': bad (ArgumentError)");
}

#[test]
fn run_main_converts_stray_throw() {
    let mut rt = Runtime::new();
    let err = rt
        .run_main(|rt, env| {
            let tag = Value::Integer(3);
            rt.catch(env, tag, |rt, _| Err(rt.throw(env, Value::Integer(3), Value::Integer(0))))?;
            let token = rt.next_unwind_token();
            Err(Unwind::Throw(Thrown {
                tag: Value::Integer(9),
                value: rt.nil(),
                target: token,
            }))
        })
        .unwrap_err();
    assert_eq!(err.class_name, "UncaughtThrowError");
    assert_eq!(err.message, "uncaught throw 9");
}

#[test]
fn backtrace_names_methods_and_blocks() {
    let rt = Runtime::new();
    let file = rt.intern("lib.rb");
    let env = rt.main_env().clone();
    let object = rt.builtins().object;
    let name = rt.intern("work");

    let frame = env.child(crate::environment::FrameKind::Method);
    frame.set_caller(&env);
    frame.set_method(Some(MethodRef::new(Method::native(name, object, Arity::Exact(0), raise_runtime_error))));
    frame.set_provenance(Some(crate::environment::Provenance { file, line: 4 }));
    let block = frame.child(crate::environment::FrameKind::Block);
    block.set_caller(&frame);

    assert_eq!(
        rt.backtrace(&block),
        vec![
            "lib.rb:4:in 'block in work'".to_owned(),
            "lib.rb:4:in 'work'".to_owned(),
            "main:in '<main>'".to_owned(),
        ]
    );
}
