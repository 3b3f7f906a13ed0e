use pretty_assertions::assert_eq;

use super::*;
use crate::tests::{describe_unwind, sym};

fn caller_is_linked(rt: &mut Runtime, env: &EnvRef, _receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    Ok(rt.bool_value(env.caller().is_some() && env.kind() == FrameKind::Method))
}

fn first_arg(rt: &mut Runtime, _env: &EnvRef, _receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    Ok(args.first().cloned().unwrap_or_else(|| rt.nil()))
}

fn read_captured(rt: &mut Runtime, env: &EnvRef, _receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let name = rt.intern("captured");
    Ok(env.lookup(name, rt.interner()).unwrap_or_else(|| rt.nil()))
}

fn depth(rt: &mut Runtime, _env: &EnvRef, _receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    Ok(Value::Integer(i64::try_from(rt.call_depth()).unwrap_or(-1)))
}

fn block_frame_kind(rt: &mut Runtime, env: &EnvRef, receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let in_block = env.kind() == FrameKind::Block && env.caller().is_some();
    Ok(if in_block { receiver } else { rt.nil() })
}

// === Arity ===

#[test]
fn arity_accepts() {
    assert!(Arity::Exact(1).accepts(1));
    assert!(!Arity::Exact(1).accepts(2));
    assert!(Arity::AtLeast(1).accepts(4));
    assert!(!Arity::AtLeast(1).accepts(0));
    assert!(Arity::Range(1, 2).accepts(2));
    assert!(!Arity::Range(1, 2).accepts(3));
}

#[test]
fn arity_display() {
    assert_eq!(Arity::Exact(2).to_string(), "2");
    assert_eq!(Arity::AtLeast(1).to_string(), "1+");
    assert_eq!(Arity::Range(0, 2).to_string(), "0..2");
}

// === Invocation ===

#[test]
fn invoke_links_caller_for_the_call_only() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let main = rt.main_object();
    let object = rt.builtins().object;
    let method = MethodRef::new(Method::native(sym(&rt, "linked"), object, Arity::Exact(0), caller_is_linked));
    let result = method.invoke(&mut rt, &env, main.clone(), &[], None).unwrap();
    assert!(result.truthy());
    assert_eq!(rt.call_depth(), 0);
}

#[test]
fn invoke_checks_arity_before_running() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let main = rt.main_object();
    let object = rt.builtins().object;
    let method = MethodRef::new(Method::native(sym(&rt, "one"), object, Arity::Exact(1), first_arg));
    let err = method
        .invoke(&mut rt, &env, main, &[], None)
        .unwrap_err();
    assert_eq!(
        describe_unwind(&rt, &err),
        (
            "ArgumentError".to_owned(),
            "wrong number of arguments (given 0, expected 1)".to_owned()
        )
    );
}

#[test]
fn closure_body_sees_captured_frame() {
    let mut rt = Runtime::new();
    let captured = rt.main_env().child(FrameKind::Method);
    let name = rt.intern("captured");
    captured.define(name, Value::Integer(11));

    let object = rt.builtins().object;
    let method = MethodRef::new(Method::closure(
        sym(&rt, "reader"),
        object,
        Arity::Exact(0),
        read_captured,
        captured.clone(),
    ));
    let env = rt.main_env().clone();
    let main = rt.main_object();
    let result = method.invoke(&mut rt, &env, main.clone(), &[], None).unwrap();
    assert_eq!(result, Value::Integer(11));

    captured.define(name, Value::Integer(12));
    let result = method.invoke(&mut rt, &env, main.clone(), &[], None).unwrap();
    assert_eq!(result, Value::Integer(12), "closure must see later mutation");
}

#[test]
fn undefined_body_raises_no_method_error() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let main = rt.main_object();
    let object = rt.builtins().object;
    let method = MethodRef::new(Method::undefined(sym(&rt, "gone"), object));
    assert!(method.is_undefined());
    let err = method
        .invoke(&mut rt, &env, main, &[], None)
        .unwrap_err();
    let (class, message) = describe_unwind(&rt, &err);
    assert_eq!(class, "NoMethodError");
    assert!(message.starts_with("undefined method 'gone'"), "{message}");
}

#[test]
fn depth_is_counted_during_the_call() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let main = rt.main_object();
    let object = rt.builtins().object;
    let method = MethodRef::new(Method::native(sym(&rt, "depth"), object, Arity::Exact(0), depth));
    let inside = method.invoke(&mut rt, &env, main.clone(), &[], None).unwrap();
    assert_eq!(inside, Value::Integer(1));
    assert_eq!(rt.call_depth(), 0);
}

#[test]
fn clone_with_visibility_keeps_body_and_tag() {
    let rt = Runtime::new();
    let integer = rt.builtins().integer;
    let method = Method::native(rt.names().add, integer, Arity::Exact(1), first_arg)
        .with_intrinsic(Intrinsic::Add);
    let private = method.clone_with_visibility(Visibility::Private);
    assert_eq!(private.visibility(), Visibility::Private);
    assert_eq!(private.intrinsic(), Some(Intrinsic::Add));
    assert_eq!(private.name(), method.name());
    assert_eq!(method.visibility(), Visibility::Public);
}

// === Blocks ===

#[test]
fn block_runs_in_a_block_frame_with_its_self() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let block = Block::new(block_frame_kind, env.clone(), Arity::AtLeast(0), Value::Integer(4));
    let result = block.call(&mut rt, &env, &[]).unwrap();
    assert_eq!(result, Value::Integer(4));
}

#[test]
fn block_arity_is_lenient() {
    let mut rt = Runtime::new();
    let env = rt.main_env().clone();
    let block = Block::new(first_arg, env.clone(), Arity::Exact(1), rt.nil());
    let result = block
        .call(&mut rt, &env, &[Value::Integer(1), Value::Integer(2)])
        .unwrap();
    assert_eq!(result, Value::Integer(1));
    assert!(block.call(&mut rt, &env, &[]).unwrap().is_nil());
}

#[test]
fn from_block_shares_the_block_environment() {
    let rt = Runtime::new();
    let env = rt.main_env().child(FrameKind::Block);
    let block = Block::new(first_arg, env.clone(), Arity::Exact(1), rt.nil());
    let object = rt.builtins().object;
    let method = Method::from_block(sym(&rt, "m"), object, &block);
    match method.body() {
        MethodBody::Closure { env: captured, .. } => assert!(EnvRef::ptr_eq(captured, &env)),
        _ => panic!("expected a closure body"),
    }
    assert_eq!(method.arity(), Arity::Exact(1));
}
