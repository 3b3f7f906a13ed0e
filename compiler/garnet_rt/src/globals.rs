//! The global registry: built-in classes, global variables, the main object.
//!
//! Owned by `Runtime` and populated once by its bootstrap. Every built-in
//! class is a plain `ModuleId` field, so none can be missing afterwards.

use garnet_ir::Name;
use rustc_hash::FxHashMap;

use crate::environment::EnvRef;
use crate::heap::{ObjectRef, Trace, Tracer};
use crate::module::ModuleId;
use crate::value::Value;

/// Why the last dispatch fell through to `method_missing`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum MethodMissingReason {
    #[default]
    Undefined,
    Private,
    Protected,
}

/// Ids of the built-in classes and modules.
#[derive(Copy, Clone, Debug)]
pub struct Builtins {
    pub basic_object: ModuleId,
    pub object: ModuleId,
    pub module: ModuleId,
    pub class: ModuleId,
    pub kernel: ModuleId,
    pub comparable: ModuleId,

    pub nil_class: ModuleId,
    pub true_class: ModuleId,
    pub false_class: ModuleId,
    pub numeric: ModuleId,
    pub integer: ModuleId,
    pub float: ModuleId,
    pub string: ModuleId,
    pub symbol: ModuleId,
    pub array: ModuleId,
    pub hash: ModuleId,
    pub regexp: ModuleId,
    pub random: ModuleId,
    pub rational: ModuleId,
    pub binding: ModuleId,
    pub proc_: ModuleId,

    pub exception: ModuleId,
    pub script_error: ModuleId,
    pub standard_error: ModuleId,
    pub system_stack_error: ModuleId,
    pub name_error: ModuleId,
    pub no_method_error: ModuleId,
    pub type_error: ModuleId,
    pub argument_error: ModuleId,
    pub uncaught_throw_error: ModuleId,
    pub range_error: ModuleId,
    pub float_domain_error: ModuleId,
    pub zero_division_error: ModuleId,
    pub runtime_error: ModuleId,
    pub frozen_error: ModuleId,
    pub local_jump_error: ModuleId,
}

pub struct Globals {
    builtins: Builtins,
    variables: FxHashMap<Name, Value>,
    main_object: ObjectRef,
    main_env: EnvRef,
    nil: ObjectRef,
    true_: ObjectRef,
    false_: ObjectRef,
    method_missing_reason: MethodMissingReason,
}

/// The special singletons built before the registry.
pub(crate) struct Singletons {
    pub(crate) main_object: ObjectRef,
    pub(crate) nil: ObjectRef,
    pub(crate) true_: ObjectRef,
    pub(crate) false_: ObjectRef,
}

impl Globals {
    pub(crate) fn new(builtins: Builtins, main_env: EnvRef, singletons: Singletons) -> Self {
        Globals {
            builtins,
            variables: FxHashMap::default(),
            main_object: singletons.main_object,
            main_env,
            nil: singletons.nil,
            true_: singletons.true_,
            false_: singletons.false_,
            method_missing_reason: MethodMissingReason::default(),
        }
    }

    #[inline]
    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Unset globals read as `nil`.
    pub fn global_get(&self, name: Name) -> Value {
        self.variables
            .get(&name)
            .cloned()
            .unwrap_or_else(|| Value::Object(self.nil.clone()))
    }

    pub fn global_set(&mut self, name: Name, value: Value) {
        self.variables.insert(name, value);
    }

    pub fn is_global_defined(&self, name: Name) -> bool {
        self.variables.contains_key(&name)
    }

    #[inline]
    pub fn main_object(&self) -> &ObjectRef {
        &self.main_object
    }

    #[inline]
    pub fn main_env(&self) -> &EnvRef {
        &self.main_env
    }

    #[inline]
    pub fn nil(&self) -> &ObjectRef {
        &self.nil
    }

    #[inline]
    pub fn true_object(&self) -> &ObjectRef {
        &self.true_
    }

    #[inline]
    pub fn false_object(&self) -> &ObjectRef {
        &self.false_
    }

    #[inline]
    pub fn method_missing_reason(&self) -> MethodMissingReason {
        self.method_missing_reason
    }

    pub fn set_method_missing_reason(&mut self, reason: MethodMissingReason) {
        self.method_missing_reason = reason;
    }
}

impl Trace for Globals {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for value in self.variables.values() {
            value.trace(tracer);
        }
        self.main_object.trace(tracer);
        self.main_env.trace(tracer);
        self.nil.trace(tracer);
        self.true_.trace(tracer);
        self.false_.trace(tracer);
    }
}
