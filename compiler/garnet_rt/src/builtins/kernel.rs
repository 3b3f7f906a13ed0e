//! `BasicObject` and `Kernel`.

use super::{selector_arg, string_arg};
use crate::environment::EnvRef;
use crate::errors;
use crate::heap::ObjectKind;
use crate::method::{Arity, BlockRef, MethodFn, Visibility};
use crate::runtime::Runtime;
use crate::unwind::RunResult;
use crate::value::Value;

pub(super) fn install(rt: &mut Runtime) {
    let basic_object = rt.builtins().basic_object;
    let kernel = rt.builtins().kernel;

    let initialize = rt.define_native(basic_object, "initialize", Arity::AtLeast(0), initialize);
    rt.modules
        .define_method(basic_object, initialize.clone_with_visibility(Visibility::Private));
    rt.define_native(basic_object, "==", Arity::Exact(1), equal);
    rt.define_native(basic_object, "equal?", Arity::Exact(1), equal);
    rt.define_native(basic_object, "!", Arity::Exact(0), not);
    rt.define_native(basic_object, "__send__", Arity::AtLeast(1), send);

    rt.define_native(kernel, "class", Arity::Exact(0), class);
    rt.define_native(kernel, "send", Arity::AtLeast(1), send);
    rt.define_native(kernel, "public_send", Arity::AtLeast(1), public_send);
    rt.define_native(kernel, "respond_to?", Arity::Range(1, 2), respond_to);
    rt.define_native(kernel, "object_id", Arity::Exact(0), object_id);
    rt.define_native(kernel, "is_a?", Arity::Exact(1), is_a);
    rt.define_native(kernel, "inspect", Arity::Exact(0), inspect);
    rt.define_native(kernel, "to_s", Arity::Exact(0), inspect);
    rt.define_native(kernel, "instance_variable_get", Arity::Exact(1), instance_variable_get);
    rt.define_native(kernel, "instance_variable_set", Arity::Exact(2), instance_variable_set);
    let private: [(&str, Arity, MethodFn); 3] = [
        ("raise", Arity::Range(0, 2), raise as MethodFn),
        ("catch", Arity::Range(0, 1), catch as MethodFn),
        ("throw", Arity::Range(1, 2), throw as MethodFn),
    ];
    for (name, arity, entry) in private {
        let method = rt.define_native(kernel, name, arity, entry);
        rt.modules
            .define_method(kernel, method.clone_with_visibility(Visibility::Private));
    }
}

fn initialize(rt: &mut Runtime, _env: &EnvRef, _receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    Ok(rt.nil())
}

fn equal(rt: &mut Runtime, _env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let same = args.first().is_some_and(|other| receiver.same_object(other));
    Ok(rt.bool_value(same))
}

fn not(rt: &mut Runtime, _env: &EnvRef, receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    Ok(rt.bool_value(!receiver.truthy()))
}

fn class(rt: &mut Runtime, _env: &EnvRef, receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let class = rt.class_of(&receiver);
    Ok(Value::Object(rt.modules().get(class).object().clone()))
}

fn send(rt: &mut Runtime, env: &EnvRef, mut receiver: Value, args: &[Value], block: Option<&BlockRef>) -> RunResult {
    let Some((selector, rest)) = args.split_first() else {
        return Err(errors::argument_error(rt, env, "no method name given"));
    };
    let name = selector_arg(rt, env, selector)?;
    rt.send(env, &mut receiver, name, rest, block)
}

fn public_send(rt: &mut Runtime, env: &EnvRef, mut receiver: Value, args: &[Value], block: Option<&BlockRef>) -> RunResult {
    let Some((selector, rest)) = args.split_first() else {
        return Err(errors::argument_error(rt, env, "no method name given"));
    };
    let name = selector_arg(rt, env, selector)?;
    rt.public_send(env, &mut receiver, name, rest, block)
}

fn respond_to(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let name = match args.first() {
        Some(selector) => selector_arg(rt, env, selector)?,
        None => return Err(errors::wrong_arity(rt, env, 0, Arity::Range(1, 2))),
    };
    let include_private = args.get(1).is_some_and(Value::truthy);
    let responds = rt.respond_to(&receiver, name, include_private);
    Ok(rt.bool_value(responds))
}

fn object_id(rt: &mut Runtime, _env: &EnvRef, mut receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    Ok(Value::Integer(rt.object_id(&mut receiver)))
}

fn is_a(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let Some(class) = args.first().and_then(|value| rt.module_of(value)) else {
        return Err(errors::type_error(rt, env, "class or module required"));
    };
    Ok(rt.bool_value(rt.is_a(&receiver, class)))
}

fn inspect(rt: &mut Runtime, _env: &EnvRef, receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let text = rt.inspect(&receiver);
    Ok(rt.string(&text))
}

fn instance_variable_get(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let name = match args.first() {
        Some(selector) => selector_arg(rt, env, selector)?,
        None => return Err(errors::wrong_arity(rt, env, 0, Arity::Exact(1))),
    };
    rt.ivar_get(env, &receiver, name)
}

fn instance_variable_set(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let [selector, value] = args else {
        return Err(errors::wrong_arity(rt, env, args.len(), Arity::Exact(2)));
    };
    let name = selector_arg(rt, env, selector)?;
    rt.ivar_set(env, &receiver, name, value.clone())
}

/// `raise`, `raise "message"`, `raise Class`, `raise Class, "message"`,
/// `raise exception`.
fn raise(rt: &mut Runtime, env: &EnvRef, _receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let runtime_error = rt.builtins().runtime_error;
    let Some(first) = args.first() else {
        return Err(rt.raise_new(env, runtime_error, "unhandled exception"));
    };

    if first.as_reference().is_some_and(|object| matches!(object.kind(), ObjectKind::String(_))) {
        let message = string_arg(rt, first);
        return Err(rt.raise_new(env, runtime_error, message));
    }

    let exception_class = rt.builtins().exception;
    if rt.module_of(first).is_some_and(|id| rt.modules().inherits(id, exception_class)) {
        let mut class = first.clone();
        let new = rt.names().new;
        let exception = rt.send(env, &mut class, new, &args[1..], None)?;
        return Err(rt.raise(env, exception));
    }

    let data = first.as_reference().and_then(|object| object.exception());
    if let (Some(data), Some(message)) = (data, args.get(1)) {
        data.set_message(string_arg(rt, message));
    }
    Err(rt.raise(env, first.clone()))
}

/// `catch(tag = Object.new) { |tag| ... }`
fn catch(rt: &mut Runtime, env: &EnvRef, _receiver: Value, args: &[Value], block: Option<&BlockRef>) -> RunResult {
    let Some(block) = block.cloned() else {
        let class = rt.builtins().local_jump_error;
        return Err(rt.raise_new(env, class, "no block given (yield)"));
    };
    let tag = match args.first() {
        Some(tag) => tag.clone(),
        None => {
            let object = rt.builtins().object;
            rt.new_object(object)
        }
    };
    rt.catch(env, tag, |rt, tag| block.call(rt, env, std::slice::from_ref(tag)))
}

/// `throw(tag, value = nil)`
fn throw(rt: &mut Runtime, env: &EnvRef, _receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let Some(tag) = args.first() else {
        return Err(errors::wrong_arity(rt, env, 0, Arity::Range(1, 2)));
    };
    let value = args.get(1).cloned().unwrap_or_else(|| rt.nil());
    Err(rt.throw(env, tag.clone(), value))
}
