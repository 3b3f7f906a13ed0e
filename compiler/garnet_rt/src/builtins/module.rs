//! `Module` and `Class`.

use super::{receiver_module, selector_arg};
use crate::environment::EnvRef;
use crate::errors;
use crate::heap::ObjectKind;
use crate::method::{Arity, BlockRef, Method, MethodFn, Visibility};
use crate::runtime::Runtime;
use crate::unwind::RunResult;
use crate::value::Value;

pub(super) fn install(rt: &mut Runtime) {
    let module = rt.builtins().module;
    let class = rt.builtins().class;

    rt.define_native(module, "name", Arity::Exact(0), name);
    rt.define_native(module, "include", Arity::AtLeast(1), include);
    rt.define_native(module, "method_defined?", Arity::Exact(1), method_defined);
    rt.define_native(module, "define_method", Arity::Exact(1), define_method);
    let maintenance: [(&str, MethodFn); 5] = [
        ("undef_method", undef_method as MethodFn),
        ("remove_method", remove_method as MethodFn),
        ("public", public as MethodFn),
        ("private", private as MethodFn),
        ("protected", protected as MethodFn),
    ];
    for (selector, entry) in maintenance {
        rt.define_native(module, selector, Arity::AtLeast(0), entry);
    }

    rt.define_native(class, "new", Arity::AtLeast(0), new);
    rt.define_native(class, "allocate", Arity::Exact(0), allocate);
    rt.define_native(class, "superclass", Arity::Exact(0), superclass);
}

fn name(rt: &mut Runtime, env: &EnvRef, receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let id = receiver_module(rt, env, &receiver)?;
    Ok(match rt.modules().get(id).name() {
        Some(name) => {
            let text = rt.name_str(name);
            rt.string(text)
        }
        None => rt.nil(),
    })
}

/// `include M1, M2` includes `M2` first, so `M1` ends up searched first.
fn include(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let target = receiver_module(rt, env, &receiver)?;
    for argument in args.iter().rev() {
        let module = receiver_module(rt, env, argument)?;
        rt.include_module(env, target, module)?;
    }
    Ok(receiver)
}

fn method_defined(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let owner = receiver_module(rt, env, &receiver)?;
    let Some(selector) = args.first() else {
        return Err(errors::wrong_arity(rt, env, 0, Arity::Exact(1)));
    };
    let name = selector_arg(rt, env, selector)?;
    let defined = rt
        .modules()
        .find_method(owner, name)
        .is_some_and(|method| !method.is_undefined() && method.visibility() != Visibility::Private);
    Ok(rt.bool_value(defined))
}

/// `define_method(:name) { |args| ... }`
fn define_method(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], block: Option<&BlockRef>) -> RunResult {
    let owner = receiver_module(rt, env, &receiver)?;
    let Some(selector) = args.first() else {
        return Err(errors::wrong_arity(rt, env, 0, Arity::Exact(1)));
    };
    let name = selector_arg(rt, env, selector)?;
    let Some(block) = block else {
        return Err(errors::argument_error(rt, env, "tried to create Proc object without a block"));
    };
    rt.define_method(Method::from_block(name, owner, block));
    Ok(rt.symbol(name))
}

fn undef_method(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let owner = receiver_module(rt, env, &receiver)?;
    for selector in args {
        let name = selector_arg(rt, env, selector)?;
        rt.undef_method(env, owner, name)?;
    }
    Ok(receiver)
}

fn remove_method(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let owner = receiver_module(rt, env, &receiver)?;
    for selector in args {
        let name = selector_arg(rt, env, selector)?;
        rt.remove_method(env, owner, name)?;
    }
    Ok(receiver)
}

fn set_visibility(rt: &mut Runtime, env: &EnvRef, receiver: &Value, args: &[Value], visibility: Visibility) -> RunResult {
    let owner = receiver_module(rt, env, receiver)?;
    for selector in args {
        let name = selector_arg(rt, env, selector)?;
        rt.set_visibility(env, owner, name, visibility)?;
    }
    Ok(rt.nil())
}

fn public(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    set_visibility(rt, env, &receiver, args, Visibility::Public)
}

fn private(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    set_visibility(rt, env, &receiver, args, Visibility::Private)
}

fn protected(rt: &mut Runtime, env: &EnvRef, receiver: Value, args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    set_visibility(rt, env, &receiver, args, Visibility::Protected)
}

/// `allocate`, then `initialize` with the same arguments and block.
fn new(rt: &mut Runtime, env: &EnvRef, mut receiver: Value, args: &[Value], block: Option<&BlockRef>) -> RunResult {
    let allocate_name = rt.names().allocate;
    let mut object = rt.send(env, &mut receiver, allocate_name, &[], None)?;
    let initialize = rt.names().initialize;
    rt.send(env, &mut object, initialize, args, block)?;
    Ok(object)
}

fn allocate(rt: &mut Runtime, env: &EnvRef, receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let class = receiver_module(rt, env, &receiver)?;
    let builtins = *rt.builtins();
    let no_allocator = [
        builtins.integer,
        builtins.float,
        builtins.symbol,
        builtins.nil_class,
        builtins.true_class,
        builtins.false_class,
    ];
    if no_allocator
        .iter()
        .any(|&special| rt.modules().inherits(class, special))
    {
        let message = format!("allocator undefined for {}", rt.class_name(class));
        return Err(errors::type_error(rt, env, message));
    }

    if rt.modules().inherits(class, builtins.exception) {
        let message = rt.class_name(class);
        return Ok(Value::Object(rt.new_exception(class, message)));
    }
    if rt.modules().inherits(class, builtins.string) {
        let object = rt.heap().allocate(class, ObjectKind::String(String::new().into()));
        return Ok(Value::Object(object));
    }
    Ok(rt.new_object(class))
}

fn superclass(rt: &mut Runtime, env: &EnvRef, receiver: Value, _args: &[Value], _block: Option<&BlockRef>) -> RunResult {
    let class = receiver_module(rt, env, &receiver)?;
    Ok(match rt.modules().get(class).superclass() {
        Some(parent) => Value::Object(rt.modules().get(parent).object().clone()),
        None => rt.nil(),
    })
}
