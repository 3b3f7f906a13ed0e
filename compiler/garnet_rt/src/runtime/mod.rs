//! The runtime context.
//!
//! `Runtime` is the explicitly constructed process context: it owns the
//! interner handle, heap, module arena and global registry, and is threaded
//! as `&mut Runtime` through every method body. Construction runs the
//! bootstrap phase (see `bootstrap.rs`), after which every built-in class
//! exists and the registry is complete.

mod bootstrap;
mod hierarchy;

use garnet_ir::{Name, SharedInterner};
use rustc_hash::FxHashMap;

use crate::config::RuntimeConfig;
use crate::diagnostics::DispatchCounters;
use crate::environment::EnvRef;
use crate::errors;
use crate::globals::{Builtins, Globals};
use crate::heap::{CollectionStats, Heap, ObjectKind, ObjectRef, Trace, Tracer};
use crate::interned_names::CoreNames;
use crate::module::{ModuleId, ModuleTable};
use crate::unwind::{RunResult, UnwindToken};
use crate::value::Value;

pub struct Runtime {
    pub(crate) interner: SharedInterner,
    pub(crate) names: CoreNames,
    pub(crate) heap: Heap,
    pub(crate) modules: ModuleTable,
    pub(crate) globals: Globals,
    /// One object per symbol name.
    pub(crate) symbols: FxHashMap<Name, ObjectRef>,
    pub(crate) config: RuntimeConfig,
    pub(crate) counters: Option<DispatchCounters>,
    /// Innermost executing frame; its caller links reach the rest of the
    /// active call chain.
    frame: Option<EnvRef>,
    call_depth: usize,
    next_token: u64,
}

impl Runtime {
    /// A runtime with default configuration and a fresh interner.
    pub fn new() -> Self {
        RuntimeBuilder::new().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    #[inline]
    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    #[inline]
    pub fn names(&self) -> &CoreNames {
        &self.names
    }

    #[inline]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[inline]
    pub fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    #[inline]
    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    #[inline]
    pub fn globals_mut(&mut self) -> &mut Globals {
        &mut self.globals
    }

    #[inline]
    pub fn builtins(&self) -> &Builtins {
        self.globals.builtins()
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn counters(&self) -> Option<&DispatchCounters> {
        self.counters.as_ref()
    }

    #[inline]
    pub fn main_env(&self) -> &EnvRef {
        self.globals.main_env()
    }

    pub fn main_object(&self) -> Value {
        Value::Object(self.globals.main_object().clone())
    }

    #[inline]
    pub fn intern(&self, text: &str) -> Name {
        self.interner.intern(text)
    }

    /// Text of an interned name.
    #[inline]
    pub fn name_str(&self, name: Name) -> &'static str {
        garnet_ir::StringInterner::lookup(&self.interner, name)
    }

    pub fn nil(&self) -> Value {
        Value::Object(self.globals.nil().clone())
    }

    pub fn bool_value(&self, b: bool) -> Value {
        let object = if b {
            self.globals.true_object()
        } else {
            self.globals.false_object()
        };
        Value::Object(object.clone())
    }

    /// The Symbol for `name`. Equal names give the identical object.
    pub fn symbol(&mut self, name: Name) -> Value {
        if let Some(symbol) = self.symbols.get(&name) {
            return Value::Object(symbol.clone());
        }
        let class = self.builtins().symbol;
        let symbol = self.heap.allocate(class, ObjectKind::Symbol(name));
        self.symbols.insert(name, symbol.clone());
        Value::Object(symbol)
    }

    pub fn string(&self, text: &str) -> Value {
        let class = self.builtins().string;
        let object = self
            .heap
            .allocate(class, ObjectKind::String(text.to_owned().into()));
        Value::Object(object)
    }

    /// A plain instance of `class`, without running `initialize`.
    pub fn new_object(&self, class: ModuleId) -> Value {
        Value::Object(self.heap.allocate(class, ObjectKind::Instance))
    }

    /// Display name of a class or module.
    pub fn class_name(&self, id: ModuleId) -> String {
        let module = self.modules.get(id);
        match module.name() {
            Some(name) => self.name_str(name).to_owned(),
            None if module.is_class() => format!("#<Class:{id:?}>"),
            None => format!("#<Module:{id:?}>"),
        }
    }

    /// `inspect`-style rendering for messages and diagnostics.
    pub fn inspect(&self, value: &Value) -> String {
        let object = match value {
            Value::Integer(i) => return i.to_string(),
            Value::Float(x) => return format_float(*x),
            Value::Object(object) => object,
        };
        match object.kind() {
            ObjectKind::Nil => "nil".to_owned(),
            ObjectKind::True => "true".to_owned(),
            ObjectKind::False => "false".to_owned(),
            ObjectKind::Integer(i) => i.to_string(),
            ObjectKind::Float(x) => format_float(*x),
            ObjectKind::Symbol(name) => format!(":{}", self.name_str(*name)),
            ObjectKind::String(text) => format!("{:?}", text.borrow()),
            ObjectKind::Exception(data) => {
                format!("#<{}: {}>", self.class_name(object.class()), data.message())
            }
            ObjectKind::Module(id) => self.class_name(*id),
            ObjectKind::Proc(_) => "#<Proc>".to_owned(),
            ObjectKind::Instance => format!("#<{}>", self.class_name(object.class())),
        }
    }

    /// Current nesting of method and block invocations.
    #[inline]
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    /// Account for a call about to start from `caller`.
    pub(crate) fn enter_call(&mut self, caller: &EnvRef) -> RunResult<()> {
        if self
            .config
            .max_call_depth
            .is_some_and(|limit| self.call_depth >= limit)
        {
            return Err(errors::stack_too_deep(self, caller));
        }
        self.call_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    /// The frame of the method or block currently running, if any.
    pub fn current_frame(&self) -> Option<&EnvRef> {
        self.frame.as_ref()
    }

    /// Make `frame` the executing frame; returns the one it replaces.
    pub(crate) fn enter_frame(&mut self, frame: &EnvRef) -> Option<EnvRef> {
        self.frame.replace(frame.clone())
    }

    pub(crate) fn leave_frame(&mut self, previous: Option<EnvRef>) {
        self.frame = previous;
    }

    pub(crate) fn next_unwind_token(&mut self) -> UnwindToken {
        self.next_token = self.next_token.wrapping_add(1);
        UnwindToken::new(self.next_token)
    }

    /// Run a mark pass from the runtime roots.
    ///
    /// `None` while collection is paused.
    pub fn collect_garbage(&self) -> Option<CollectionStats> {
        self.heap.collect(self)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Roots: the registry, every module, the symbol table and the active call
/// chain.
impl Trace for Runtime {
    fn trace(&self, tracer: &mut dyn Tracer) {
        self.globals.trace(tracer);
        if let Some(frame) = &self.frame {
            frame.trace(tracer);
        }
        self.modules.trace(tracer);
        for symbol in self.symbols.values() {
            symbol.trace(tracer);
        }
    }
}

#[allow(clippy::float_cmp, reason = "integral check on the fractional part")]
fn format_float(x: f64) -> String {
    if x.is_nan() {
        "NaN".to_owned()
    } else if x.is_infinite() {
        let sign = if x > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// Builder for `Runtime`.
pub struct RuntimeBuilder {
    interner: Option<SharedInterner>,
    config: RuntimeConfig,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        RuntimeBuilder {
            interner: None,
            config: RuntimeConfig::default(),
        }
    }

    /// Share an existing interner, e.g. the one the front end interned into.
    #[must_use]
    pub fn interner(mut self, interner: SharedInterner) -> Self {
        self.interner = Some(interner);
        self
    }

    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn max_call_depth(mut self, limit: Option<usize>) -> Self {
        self.config.max_call_depth = limit;
        self
    }

    #[must_use]
    pub fn profile(mut self, enabled: bool) -> Self {
        self.config.profile = enabled;
        self
    }

    #[must_use]
    pub fn script_name(mut self, name: impl Into<String>) -> Self {
        self.config.script_name = name.into();
        self
    }

    /// Bootstrap the runtime.
    pub fn build(self) -> Runtime {
        bootstrap::bootstrap(self.interner.unwrap_or_default(), self.config)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
