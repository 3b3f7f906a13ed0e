//! `Integer` and `Float` operators.
//!
//! Each is installed carrying its `Intrinsic` tag, which is what lets the
//! dispatcher run it on an immediate receiver without hydrating.

use crate::dispatch::{native_entry, Intrinsic};
use crate::method::{Arity, Method};
use crate::runtime::Runtime;

pub(super) fn install(rt: &mut Runtime) {
    let integer = rt.builtins().integer;
    let float = rt.builtins().float;

    for op in Intrinsic::INTEGER {
        let selector = rt.names().selector(op);
        let method = Method::native(selector, integer, Arity::Exact(1), native_entry(op)).with_intrinsic(op);
        rt.define_method(method);
    }
    for op in Intrinsic::FLOAT {
        let selector = rt.names().selector(op);
        let method = Method::native(selector, float, Arity::Exact(1), native_entry(op)).with_intrinsic(op);
        rt.define_method(method);
    }

    // Float#% always goes through the general path.
    let rem = rt.names().rem;
    rt.define_method(Method::native(rem, float, Arity::Exact(1), native_entry(Intrinsic::Mod)));
}
