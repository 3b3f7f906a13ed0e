//! Heap objects and the collector interface.
//!
//! The collector proper is an external collaborator. The core consumes it
//! through three things only:
//!
//! - `Heap::allocate`, the single constructor of `ObjectRef`
//! - `Heap::enable` / `Heap::disable` (and the `GcPause` guard) for sections
//!   that must not observe a collection, such as hydration
//! - the `Trace` / `Tracer` visit-children contract
//!
//! `Heap::collect` is a reference mark pass over the roots. Object lifetime
//! itself is reference-counted; the mark pass reports which live objects are
//! reachable, which is how tests audit that no `Trace` impl drops an edge.

#![allow(
    clippy::disallowed_types,
    reason = "Rc is the implementation of ObjectRef"
)]

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use garnet_ir::Name;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::environment::EnvRef;
use crate::method::{BlockRef, MethodRef};
use crate::module::ModuleId;
use crate::stack::ensure_sufficient_stack;
use crate::value::Value;

/// Registry size below which dead entries are not pruned on allocation.
const MIN_PRUNE_THRESHOLD: usize = 1024;

/// Sequential identity of a heap object, stable for its lifetime.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Raw id as reported by `object_id`.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Payload carried by an exception object.
#[derive(Debug, Default)]
pub struct ExceptionData {
    message: RefCell<String>,
    /// Selector that failed, for `NameError` and its subclasses.
    name: Cell<Option<Name>>,
    backtrace: RefCell<Vec<String>>,
}

impl ExceptionData {
    pub fn new(message: impl Into<String>) -> Self {
        ExceptionData {
            message: RefCell::new(message.into()),
            name: Cell::new(None),
            backtrace: RefCell::new(Vec::new()),
        }
    }

    pub fn message(&self) -> String {
        self.message.borrow().clone()
    }

    pub fn set_message(&self, message: impl Into<String>) {
        *self.message.borrow_mut() = message.into();
    }

    pub fn name(&self) -> Option<Name> {
        self.name.get()
    }

    pub fn set_name(&self, name: Name) {
        self.name.set(Some(name));
    }

    pub fn backtrace(&self) -> Vec<String> {
        self.backtrace.borrow().clone()
    }

    pub fn has_backtrace(&self) -> bool {
        !self.backtrace.borrow().is_empty()
    }

    pub fn set_backtrace(&self, frames: Vec<String>) {
        *self.backtrace.borrow_mut() = frames;
    }
}

/// Shape of a heap object's payload.
pub enum ObjectKind {
    /// Plain instance of a user or library class.
    Instance,
    Nil,
    True,
    False,
    /// Boxed integer produced by hydration.
    Integer(i64),
    /// Boxed float produced by hydration.
    Float(f64),
    Symbol(Name),
    String(RefCell<String>),
    Exception(ExceptionData),
    /// Class object of the module with this id.
    Module(ModuleId),
    Proc(BlockRef),
}

impl fmt::Debug for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Instance => write!(f, "Instance"),
            ObjectKind::Nil => write!(f, "Nil"),
            ObjectKind::True => write!(f, "True"),
            ObjectKind::False => write!(f, "False"),
            ObjectKind::Integer(i) => write!(f, "Integer({i})"),
            ObjectKind::Float(x) => write!(f, "Float({x})"),
            ObjectKind::Symbol(name) => write!(f, "Symbol({name:?})"),
            ObjectKind::String(s) => write!(f, "String({:?})", s.borrow()),
            ObjectKind::Exception(data) => write!(f, "Exception({:?})", data.message()),
            ObjectKind::Module(id) => write!(f, "Module({id:?})"),
            ObjectKind::Proc(_) => write!(f, "Proc"),
        }
    }
}

/// A heap-resident object.
pub struct HeapObject {
    id: ObjectId,
    /// Fixed up once during bootstrap for the first class objects.
    class: Cell<ModuleId>,
    kind: ObjectKind,
    ivars: RefCell<FxHashMap<Name, Value>>,
    singleton_methods: RefCell<FxHashMap<Name, MethodRef>>,
}

impl HeapObject {
    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn class(&self) -> ModuleId {
        self.class.get()
    }

    pub(crate) fn set_class(&self, class: ModuleId) {
        self.class.set(class);
    }

    #[inline]
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Exception payload, if this object is an exception.
    pub fn exception(&self) -> Option<&ExceptionData> {
        match &self.kind {
            ObjectKind::Exception(data) => Some(data),
            _ => None,
        }
    }

    /// A hydrated Integer or Float. These behave like their immediates: no
    /// instance variables, no singleton methods.
    pub fn is_boxed_numeric(&self) -> bool {
        matches!(self.kind, ObjectKind::Integer(_) | ObjectKind::Float(_))
    }

    /// Module id, if this object is a class or module object.
    pub fn module_id(&self) -> Option<ModuleId> {
        match self.kind {
            ObjectKind::Module(id) => Some(id),
            _ => None,
        }
    }

    pub fn ivar(&self, name: Name) -> Option<Value> {
        self.ivars.borrow().get(&name).cloned()
    }

    pub fn set_ivar(&self, name: Name, value: Value) {
        let mut ivars = self.ivars.borrow_mut();
        ivars.remove(&name);
        ivars.insert(name, value);
    }

    pub fn ivar_names(&self) -> Vec<Name> {
        self.ivars.borrow().keys().copied().collect()
    }

    pub fn singleton_method(&self, name: Name) -> Option<MethodRef> {
        self.singleton_methods.borrow().get(&name).cloned()
    }

    pub fn has_singleton_methods(&self) -> bool {
        !self.singleton_methods.borrow().is_empty()
    }

    pub(crate) fn define_singleton_method(&self, method: MethodRef) {
        self.singleton_methods
            .borrow_mut()
            .insert(method.name(), method);
    }
}

/// Releases instance-variable chains iteratively, so dropping the head of a
/// long linked structure does not recurse once per link.
impl Drop for HeapObject {
    fn drop(&mut self) {
        let mut pending: Vec<Value> = self.ivars.get_mut().drain().map(|(_, value)| value).collect();
        while let Some(value) = pending.pop() {
            if let Value::Object(object) = value {
                if Rc::strong_count(&object.0) == 1 {
                    pending.extend(object.ivars.borrow_mut().drain().map(|(_, value)| value));
                }
            }
        }
    }
}

/// Shared handle to a heap object.
///
/// Only `Heap::allocate` constructs one, so every object the program can
/// reach has been registered with the heap.
#[derive(Clone)]
pub struct ObjectRef(Rc<HeapObject>);

impl ObjectRef {
    /// Identity comparison.
    #[inline]
    pub fn ptr_eq(a: &ObjectRef, b: &ObjectRef) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl Deref for ObjectRef {
    type Target = HeapObject;

    #[inline]
    fn deref(&self) -> &HeapObject {
        &self.0
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<{:?} id={}>", self.0.kind, self.0.id.0)
    }
}

/// Visit-children contract.
///
/// Every heap-resident entity forwards the tracer to each reference it owns
/// or weakly depends on. An omitted edge lets the collector free an object
/// that is still reachable.
pub trait Trace {
    fn trace(&self, tracer: &mut dyn Tracer);
}

/// Receives the edges reported by `Trace` implementations.
///
/// Each `mark_*` returns `true` the first time a given entity is reached;
/// callers only descend into its children in that case, which keeps cyclic
/// graphs finite.
pub trait Tracer {
    fn mark_object(&mut self, object: &ObjectRef) -> bool;
    fn mark_env(&mut self, env: &EnvRef) -> bool;
    fn mark_module(&mut self, id: ModuleId) -> bool;
}

impl Trace for ObjectRef {
    fn trace(&self, tracer: &mut dyn Tracer) {
        if !tracer.mark_object(self) {
            return;
        }
        ensure_sufficient_stack(|| {
            tracer.mark_module(self.class());
            for value in self.ivars.borrow().values() {
                value.trace(tracer);
            }
            for method in self.singleton_methods.borrow().values() {
                method.trace(tracer);
            }
            match &self.kind {
                ObjectKind::Module(id) => {
                    tracer.mark_module(*id);
                }
                ObjectKind::Proc(block) => block.trace(tracer),
                _ => {}
            }
        });
    }
}

/// Mark pass used by `Heap::collect`.
#[derive(Default)]
pub struct MarkTracer {
    objects: FxHashSet<ObjectId>,
    envs: FxHashSet<usize>,
    modules: FxHashSet<ModuleId>,
}

impl MarkTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_marked(&self, object: &ObjectRef) -> bool {
        self.objects.contains(&object.id())
    }

    pub fn is_env_marked(&self, env: &EnvRef) -> bool {
        self.envs.contains(&env.addr())
    }

    pub fn marked_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn marked_modules(&self) -> usize {
        self.modules.len()
    }
}

impl Tracer for MarkTracer {
    fn mark_object(&mut self, object: &ObjectRef) -> bool {
        self.objects.insert(object.id())
    }

    fn mark_env(&mut self, env: &EnvRef) -> bool {
        self.envs.insert(env.addr())
    }

    fn mark_module(&mut self, id: ModuleId) -> bool {
        self.modules.insert(id)
    }
}

/// Result of a mark pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectionStats {
    /// Objects still alive.
    pub live: usize,
    /// Live objects reached from the roots.
    pub reachable: usize,
    /// Live objects the roots do not reach (held only by native frames or cycles).
    pub unreachable: usize,
}

/// Object allocator and collector front end.
pub struct Heap {
    enabled: Cell<bool>,
    pending: Cell<bool>,
    next_id: Cell<u64>,
    allocations: Cell<usize>,
    objects: RefCell<Vec<Weak<HeapObject>>>,
    /// Registry length at which `allocate` next drops dead entries.
    prune_at: Cell<usize>,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            enabled: Cell::new(true),
            pending: Cell::new(false),
            next_id: Cell::new(1),
            allocations: Cell::new(0),
            objects: RefCell::new(Vec::new()),
            prune_at: Cell::new(MIN_PRUNE_THRESHOLD),
        }
    }

    /// Allocate a new object of `class`.
    pub fn allocate(&self, class: ModuleId, kind: ObjectKind) -> ObjectRef {
        let id = ObjectId(self.next_id.get());
        self.next_id.set(id.0.wrapping_add(1));
        self.allocations.set(self.allocations.get().wrapping_add(1));

        let object = Rc::new(HeapObject {
            id,
            class: Cell::new(class),
            kind,
            ivars: RefCell::new(FxHashMap::default()),
            singleton_methods: RefCell::new(FxHashMap::default()),
        });
        let mut objects = self.objects.borrow_mut();
        if objects.len() >= self.prune_at.get() {
            objects.retain(|weak| weak.strong_count() > 0);
            self.prune_at
                .set((objects.len() * 2).max(MIN_PRUNE_THRESHOLD));
        }
        objects.push(Rc::downgrade(&object));
        ObjectRef(object)
    }

    /// Registry entries currently held, dead ones included.
    pub fn tracked_entries(&self) -> usize {
        self.objects.borrow().len()
    }

    pub fn enable(&self) {
        self.enabled.set(true);
    }

    pub fn disable(&self) {
        self.enabled.set(false);
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Disable collection until the returned guard is dropped.
    ///
    /// The previous state is restored on drop, so pauses nest.
    pub fn pause(&self) -> GcPause<'_> {
        let was_enabled = self.is_enabled();
        self.disable();
        GcPause {
            heap: self,
            was_enabled,
        }
    }

    /// Total number of allocations since creation.
    #[inline]
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    /// A collection was requested while the heap was paused.
    pub fn has_pending_collection(&self) -> bool {
        self.pending.get()
    }

    /// Number of allocated objects that are still alive.
    pub fn live_objects(&self) -> usize {
        self.objects
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Run a mark pass from `roots`.
    ///
    /// Returns `None` and records a pending request while collection is
    /// disabled.
    pub fn collect(&self, roots: &dyn Trace) -> Option<CollectionStats> {
        if !self.is_enabled() {
            self.pending.set(true);
            tracing::trace!("collection deferred while paused");
            return None;
        }
        self.pending.set(false);

        let mut tracer = MarkTracer::new();
        roots.trace(&mut tracer);

        let mut objects = self.objects.borrow_mut();
        objects.retain(|weak| weak.strong_count() > 0);
        self.prune_at
            .set((objects.len() * 2).max(MIN_PRUNE_THRESHOLD));
        let live = objects.len();
        let reachable = objects
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|object| tracer.objects.contains(&object.id))
            .count();
        let stats = CollectionStats {
            live,
            reachable,
            unreachable: live.saturating_sub(reachable),
        };
        tracing::debug!(
            live = stats.live,
            reachable = stats.reachable,
            unreachable = stats.unreachable,
            "mark pass complete"
        );
        Some(stats)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `Heap::pause`.
pub struct GcPause<'a> {
    heap: &'a Heap,
    was_enabled: bool,
}

impl Drop for GcPause<'_> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.heap.enable();
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
