//! Scope frames and the closure chain.
//!
//! Every method or block invocation gets a fresh `Env`. Frames are linked two
//! ways:
//!
//! - `outer`: the lexically enclosing frame, shared-owned. A closure keeps its
//!   defining frame alive for as long as the closure lives.
//! - `caller`: the dynamically calling frame, held weakly and only for the
//!   duration of the call. Backtraces and unwind targeting walk this link.

#![allow(clippy::disallowed_types, reason = "Rc is the implementation of EnvRef")]

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use garnet_ir::{Name, StringLookup};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::heap::{Trace, Tracer};
use crate::method::{BlockRef, MethodRef};
use crate::stack::ensure_sufficient_stack;
use crate::unwind::{TargetKind, UnwindTarget, UnwindToken};
use crate::value::Value;

/// What created a frame. Block frames are transparent to local lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// The program's top-level frame.
    Top,
    /// A class or module body; holds the module's constants.
    Module,
    Method,
    /// A method defined from a block; the defining frame's locals stay visible.
    ClosureMethod,
    Block,
}

impl FrameKind {
    /// Whether local lookup continues into the lexically enclosing frame.
    #[inline]
    fn is_transparent(self) -> bool {
        matches!(self, FrameKind::Block | FrameKind::ClosureMethod)
    }
}

/// Source position a frame is currently executing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Provenance {
    pub file: Name,
    pub line: u32,
}

/// A single scope frame.
pub struct Env {
    kind: FrameKind,
    bindings: RefCell<FxHashMap<Name, Value>>,
    outer: Option<EnvRef>,
    caller: RefCell<Weak<Env>>,
    provenance: Cell<Option<Provenance>>,
    method: RefCell<Option<MethodRef>>,
    block: RefCell<Option<BlockRef>>,
    /// `self` of the call running in this frame.
    receiver: RefCell<Option<Value>>,
    /// Position in the receiver's ancestors where the running method was
    /// found, when it was reached through `super`.
    ancestor_index: Cell<Option<usize>>,
    /// Innermost registration last.
    unwind_targets: RefCell<SmallVec<[UnwindTarget; 2]>>,
    /// Payload delivered to this frame by the last rescue.
    exception: RefCell<Option<Value>>,
}

/// Shared handle to an `Env`.
#[derive(Clone)]
pub struct EnvRef(Rc<Env>);

impl EnvRef {
    pub fn new(kind: FrameKind, outer: Option<EnvRef>) -> Self {
        EnvRef(Rc::new(Env {
            kind,
            bindings: RefCell::new(FxHashMap::default()),
            outer,
            caller: RefCell::new(Weak::new()),
            provenance: Cell::new(None),
            method: RefCell::new(None),
            block: RefCell::new(None),
            receiver: RefCell::new(None),
            ancestor_index: Cell::new(None),
            unwind_targets: RefCell::new(SmallVec::new()),
            exception: RefCell::new(None),
        }))
    }

    /// A fresh top-level frame.
    pub fn top() -> Self {
        Self::new(FrameKind::Top, None)
    }

    /// A frame whose lexical parent is `self`.
    pub fn child(&self, kind: FrameKind) -> Self {
        Self::new(kind, Some(self.clone()))
    }

    #[inline]
    pub fn ptr_eq(a: &EnvRef, b: &EnvRef) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Stable address, used as the frame's identity by tracers.
    #[inline]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Link the calling frame for the duration of a call.
    pub fn set_caller(&self, caller: &EnvRef) {
        *self.caller.borrow_mut() = Rc::downgrade(&caller.0);
    }

    pub fn clear_caller(&self) {
        *self.caller.borrow_mut() = Weak::new();
    }

    /// The calling frame, if a call is in progress.
    pub fn caller(&self) -> Option<EnvRef> {
        self.caller.borrow().upgrade().map(EnvRef)
    }
}

impl Deref for EnvRef {
    type Target = Env;

    #[inline]
    fn deref(&self) -> &Env {
        &self.0
    }
}

impl fmt::Debug for EnvRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("kind", &self.kind)
            .field("bindings", &self.bindings.borrow().len())
            .field("addr", &format_args!("{:#x}", self.addr()))
            .finish_non_exhaustive()
    }
}

/// Names that resolve through enclosing frames even from a method frame:
/// constants and the reserved literals.
fn is_lexically_visible(name: Name, names: &impl StringLookup) -> bool {
    let text = names.lookup(name);
    matches!(text, "nil" | "true" | "false")
        || text.chars().next().is_some_and(char::is_uppercase)
}

impl Env {
    #[inline]
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    #[inline]
    pub fn outer(&self) -> Option<&EnvRef> {
        self.outer.as_ref()
    }

    /// Walk outward from this frame to the frame that binds `name`.
    fn defining_frame<'a>(&'a self, name: Name, names: &impl StringLookup) -> Option<&'a Env> {
        let mut lexical: Option<bool> = None;
        let mut frame = self;
        loop {
            if frame.bindings.borrow().contains_key(&name) {
                return Some(frame);
            }
            let passes = frame.kind.is_transparent()
                || *lexical.get_or_insert_with(|| is_lexically_visible(name, names));
            match (&frame.outer, passes) {
                (Some(outer), true) => frame = &**outer,
                _ => return None,
            }
        }
    }

    /// Resolve `name`. Returns `None` rather than raising.
    pub fn lookup(&self, name: Name, names: &impl StringLookup) -> Option<Value> {
        self.defining_frame(name, names)
            .and_then(|frame| frame.bindings.borrow().get(&name).cloned())
    }

    /// Binding in this frame only.
    pub fn lookup_local(&self, name: Name) -> Option<Value> {
        self.bindings.borrow().get(&name).cloned()
    }

    /// Assign in the frame that already binds `name`, else in this frame.
    pub fn assign(&self, name: Name, value: Value, names: &impl StringLookup) {
        let frame = self.defining_frame(name, names).unwrap_or(self);
        let mut bindings = frame.bindings.borrow_mut();
        bindings.remove(&name);
        bindings.insert(name, value);
    }

    /// Bind `name` in this frame, shadowing any outer binding.
    pub fn define(&self, name: Name, value: Value) {
        self.bindings.borrow_mut().insert(name, value);
    }

    /// Names bound directly in this frame.
    pub fn local_names(&self) -> Vec<Name> {
        self.bindings.borrow().keys().copied().collect()
    }

    pub fn set_provenance(&self, provenance: Option<Provenance>) {
        self.provenance.set(provenance);
    }

    /// Update the line this frame is executing, keeping its file.
    pub fn set_line(&self, line: u32) {
        if let Some(mut provenance) = self.provenance() {
            provenance.line = line;
            self.provenance.set(Some(provenance));
        }
    }

    /// This frame's position, or the nearest lexically enclosing one.
    pub fn provenance(&self) -> Option<Provenance> {
        let mut frame = self;
        loop {
            if let Some(provenance) = frame.provenance.get() {
                return Some(provenance);
            }
            frame = frame.outer.as_deref()?;
        }
    }

    pub fn method(&self) -> Option<MethodRef> {
        self.method.borrow().clone()
    }

    pub fn set_method(&self, method: Option<MethodRef>) {
        *self.method.borrow_mut() = method;
    }

    pub fn block(&self) -> Option<BlockRef> {
        self.block.borrow().clone()
    }

    pub fn set_block(&self, block: Option<BlockRef>) {
        *self.block.borrow_mut() = block;
    }

    pub fn receiver(&self) -> Option<Value> {
        self.receiver.borrow().clone()
    }

    pub fn set_receiver(&self, receiver: Option<Value>) {
        *self.receiver.borrow_mut() = receiver;
    }

    #[inline]
    pub fn ancestor_index(&self) -> Option<usize> {
        self.ancestor_index.get()
    }

    pub(crate) fn set_ancestor_index(&self, index: Option<usize>) {
        self.ancestor_index.set(index);
    }

    /// Nearest method frame, looking through enclosing block frames.
    pub fn method_frame(&self) -> Option<&Env> {
        let mut frame = self;
        loop {
            match frame.kind {
                FrameKind::Method | FrameKind::ClosureMethod => return Some(frame),
                FrameKind::Block => frame = frame.outer.as_deref()?,
                FrameKind::Top | FrameKind::Module => return None,
            }
        }
    }

    /// The block `yield` would call from here.
    pub fn current_block(&self) -> Option<BlockRef> {
        self.method_frame().and_then(Env::block)
    }

    pub fn exception(&self) -> Option<Value> {
        self.exception.borrow().clone()
    }

    pub fn set_exception(&self, exception: Option<Value>) {
        *self.exception.borrow_mut() = exception;
    }

    pub(crate) fn push_unwind_target(&self, target: UnwindTarget) {
        self.unwind_targets.borrow_mut().push(target);
    }

    pub(crate) fn pop_unwind_target(&self, token: UnwindToken) {
        let mut targets = self.unwind_targets.borrow_mut();
        if let Some(index) = targets.iter().rposition(|target| target.token == token) {
            targets.remove(index);
        }
    }

    /// Innermost target registered on this frame that `accepts` matches.
    pub(crate) fn find_unwind_target(
        &self,
        mut accepts: impl FnMut(&TargetKind) -> bool,
    ) -> Option<UnwindToken> {
        self.unwind_targets
            .borrow()
            .iter()
            .rev()
            .find(|target| accepts(&target.kind))
            .map(|target| target.token)
    }

    pub fn is_unwind_target(&self) -> bool {
        !self.unwind_targets.borrow().is_empty()
    }
}

impl Trace for EnvRef {
    fn trace(&self, tracer: &mut dyn Tracer) {
        if !tracer.mark_env(self) {
            return;
        }
        ensure_sufficient_stack(|| {
            for value in self.bindings.borrow().values() {
                value.trace(tracer);
            }
            if let Some(receiver) = self.receiver.borrow().as_ref() {
                receiver.trace(tracer);
            }
            if let Some(outer) = &self.outer {
                outer.trace(tracer);
            }
            if let Some(caller) = self.caller() {
                caller.trace(tracer);
            }
            if let Some(method) = self.method.borrow().as_ref() {
                method.trace(tracer);
            }
            if let Some(block) = self.block.borrow().as_ref() {
                block.trace(tracer);
            }
            for target in self.unwind_targets.borrow().iter() {
                if let TargetKind::Catch(tag) = &target.kind {
                    tag.trace(tracer);
                }
            }
            if let Some(exception) = self.exception.borrow().as_ref() {
                exception.trace(tracer);
            }
        });
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
