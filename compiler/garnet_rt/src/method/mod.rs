//! Methods, blocks and the call-frame protocol.
//!
//! A `Method` pairs a name and an owning module with either a native entry
//! point or a compiled body plus its captured environment. Invoking one builds
//! a fresh `Method` frame chained to that environment (or to the owner's
//! environment), links the caller for the duration of the call, runs the
//! entry point and unlinks the caller again.

#![allow(
    clippy::disallowed_types,
    reason = "Rc is the implementation of MethodRef and BlockRef"
)]

use std::fmt;
use std::rc::Rc;

use garnet_ir::Name;

use crate::dispatch::Intrinsic;
use crate::environment::{EnvRef, FrameKind};
use crate::errors;
use crate::heap::{Trace, Tracer};
use crate::module::ModuleId;
use crate::runtime::Runtime;
use crate::stack::ensure_sufficient_stack;
use crate::unwind::RunResult;
use crate::value::Value;

/// Calling convention shared by native methods and compiled bodies.
///
/// The environment is the frame created for this call.
pub type MethodFn = fn(&mut Runtime, &EnvRef, Value, &[Value], Option<&BlockRef>) -> RunResult;

pub type MethodRef = Rc<Method>;
pub type BlockRef = Rc<Block>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
}

/// Accepted argument counts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive range, for optional parameters.
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, given: usize) -> bool {
        match self {
            Arity::Exact(n) => given == n,
            Arity::AtLeast(n) => given >= n,
            Arity::Range(min, max) => (min..=max).contains(&given),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "{n}+"),
            Arity::Range(min, max) => write!(f, "{min}..{max}"),
        }
    }
}

#[derive(Clone)]
pub enum MethodBody {
    /// Native entry point; the frame chains to the owner's environment.
    Native(MethodFn),
    /// Compiled body with the environment it closed over.
    Closure { entry: MethodFn, env: EnvRef },
    /// Placeholder left by `undef_method`. Stops lookup, raises if invoked.
    Undefined,
}

pub struct Method {
    name: Name,
    owner: ModuleId,
    arity: Arity,
    visibility: Visibility,
    body: MethodBody,
    intrinsic: Option<Intrinsic>,
}

impl Method {
    /// A public method.
    pub fn new(name: Name, owner: ModuleId, arity: Arity, body: MethodBody) -> Self {
        Method {
            name,
            owner,
            arity,
            visibility: Visibility::Public,
            body,
            intrinsic: None,
        }
    }

    pub fn native(name: Name, owner: ModuleId, arity: Arity, entry: MethodFn) -> Self {
        Self::new(name, owner, arity, MethodBody::Native(entry))
    }

    pub fn closure(name: Name, owner: ModuleId, arity: Arity, entry: MethodFn, env: EnvRef) -> Self {
        Self::new(name, owner, arity, MethodBody::Closure { entry, env })
    }

    /// A method whose body is an existing block (`define_method` with a block).
    pub fn from_block(name: Name, owner: ModuleId, block: &Block) -> Self {
        Self::closure(name, owner, block.arity, block.entry, block.env.clone())
    }

    pub fn undefined(name: Name, owner: ModuleId) -> Self {
        Self::new(name, owner, Arity::AtLeast(0), MethodBody::Undefined)
    }

    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub(crate) fn with_intrinsic(mut self, intrinsic: Intrinsic) -> Self {
        self.intrinsic = Some(intrinsic);
        self
    }

    /// Copy of this method under a different visibility.
    pub fn clone_with_visibility(&self, visibility: Visibility) -> Self {
        Method {
            name: self.name,
            owner: self.owner,
            arity: self.arity,
            visibility,
            body: self.body.clone(),
            intrinsic: self.intrinsic,
        }
    }

    #[inline]
    pub fn name(&self) -> Name {
        self.name
    }

    #[inline]
    pub fn owner(&self) -> ModuleId {
        self.owner
    }

    #[inline]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn body(&self) -> &MethodBody {
        &self.body
    }

    /// Fast-path tag, present only on the numeric builtins.
    #[inline]
    pub fn intrinsic(&self) -> Option<Intrinsic> {
        self.intrinsic
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self.body, MethodBody::Undefined)
    }

    /// Run this method with `receiver` as self.
    pub fn invoke(
        self: &Rc<Self>,
        rt: &mut Runtime,
        caller: &EnvRef,
        receiver: Value,
        args: &[Value],
        block: Option<&BlockRef>,
    ) -> RunResult {
        self.invoke_at(rt, caller, receiver, args, block, None)
    }

    /// `invoke`, recording where in the receiver's ancestors this method was
    /// found so a later `super` resumes after that position.
    pub(crate) fn invoke_at(
        self: &Rc<Self>,
        rt: &mut Runtime,
        caller: &EnvRef,
        receiver: Value,
        args: &[Value],
        block: Option<&BlockRef>,
        ancestor_index: Option<usize>,
    ) -> RunResult {
        let (entry, outer, kind) = match &self.body {
            MethodBody::Native(entry) => (
                *entry,
                rt.modules().get(self.owner).env().clone(),
                FrameKind::Method,
            ),
            MethodBody::Closure { entry, env } => (*entry, env.clone(), FrameKind::ClosureMethod),
            MethodBody::Undefined => {
                return Err(errors::undefined_method_called(rt, caller, self.name, &receiver));
            }
        };
        if !self.arity.accepts(args.len()) {
            return Err(errors::wrong_arity(rt, caller, args.len(), self.arity));
        }

        let frame = outer.child(kind);
        frame.set_caller(caller);
        frame.set_provenance(caller.provenance());
        frame.set_method(Some(Rc::clone(self)));
        frame.set_block(block.cloned());
        frame.set_receiver(Some(receiver.clone()));
        frame.set_ancestor_index(ancestor_index);

        let _span = tracing::debug_span!("invoke", method = rt.name_str(self.name)).entered();
        rt.enter_call(caller)?;
        let previous = rt.enter_frame(&frame);
        let result = ensure_sufficient_stack(|| entry(rt, &frame, receiver, args, block));
        rt.leave_frame(previous);
        rt.leave_call();
        frame.clear_caller();
        frame.set_receiver(None);
        result
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match self.body {
            MethodBody::Native(_) => "native",
            MethodBody::Closure { .. } => "closure",
            MethodBody::Undefined => "undefined",
        };
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("arity", &self.arity)
            .field("visibility", &self.visibility)
            .field("body", &body)
            .finish()
    }
}

impl Trace for Method {
    fn trace(&self, tracer: &mut dyn Tracer) {
        tracer.mark_module(self.owner);
        if let MethodBody::Closure { env, .. } = &self.body {
            env.trace(tracer);
        }
    }
}

/// A compiled block with the environment and `self` it closed over.
pub struct Block {
    entry: MethodFn,
    env: EnvRef,
    arity: Arity,
    self_value: Value,
}

impl Block {
    pub fn new(entry: MethodFn, env: EnvRef, arity: Arity, self_value: Value) -> Self {
        Block {
            entry,
            env,
            arity,
            self_value,
        }
    }

    #[inline]
    pub fn env(&self) -> &EnvRef {
        &self.env
    }

    #[inline]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    #[inline]
    pub fn self_value(&self) -> &Value {
        &self.self_value
    }

    /// Run the block in a fresh block frame.
    ///
    /// Arity is not enforced; the compiled body pads or drops arguments.
    pub fn call(&self, rt: &mut Runtime, caller: &EnvRef, args: &[Value]) -> RunResult {
        let frame = self.env.child(FrameKind::Block);
        frame.set_caller(caller);
        frame.set_provenance(caller.provenance());

        frame.set_receiver(Some(self.self_value.clone()));

        rt.enter_call(caller)?;
        let previous = rt.enter_frame(&frame);
        let entry = self.entry;
        let receiver = self.self_value.clone();
        let result = ensure_sufficient_stack(|| entry(rt, &frame, receiver, args, None));
        rt.leave_frame(previous);
        rt.leave_call();
        frame.clear_caller();
        frame.set_receiver(None);
        result
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("arity", &self.arity)
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

impl Trace for Block {
    fn trace(&self, tracer: &mut dyn Tracer) {
        self.env.trace(tracer);
        self.self_value.trace(tracer);
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests;
