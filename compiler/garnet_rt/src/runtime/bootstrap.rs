//! Bootstrap: build the built-in hierarchy and the registry.
//!
//! Order matters. `BasicObject`, `Object`, `Module` and `Class` are created
//! before `Class` exists, so their class objects start with a placeholder
//! class and are fixed up once `Class` is known. Everything after that is
//! created normally. Each built-in id is recorded exactly once, in `Builtins`.

use garnet_ir::{SharedInterner, StringInterner};
use rustc_hash::FxHashMap;

use super::Runtime;
use crate::builtins;
use crate::config::RuntimeConfig;
use crate::diagnostics::DispatchCounters;
use crate::environment::{EnvRef, FrameKind};
use crate::globals::{Builtins, Globals, Singletons};
use crate::heap::{Heap, ObjectKind};
use crate::interned_names::CoreNames;
use crate::module::{ModuleId, ModuleKind, ModuleTable};
use crate::value::Value;

struct Boot<'a> {
    interner: &'a StringInterner,
    heap: &'a Heap,
    modules: &'a mut ModuleTable,
    top: &'a EnvRef,
    class_meta: ModuleId,
    module_meta: ModuleId,
}

impl Boot<'_> {
    fn class(&mut self, name: &str, superclass: Option<ModuleId>) -> ModuleId {
        let env = match superclass {
            Some(parent) => self.modules.get(parent).env().child(FrameKind::Module),
            None => self.top.child(FrameKind::Module),
        };
        self.create(name, ModuleKind::Class, superclass, env, self.class_meta)
    }

    fn module(&mut self, name: &str) -> ModuleId {
        let env = self.top.child(FrameKind::Module);
        self.create(name, ModuleKind::Module, None, env, self.module_meta)
    }

    fn create(
        &mut self,
        name: &str,
        kind: ModuleKind,
        superclass: Option<ModuleId>,
        env: EnvRef,
        meta: ModuleId,
    ) -> ModuleId {
        let name = self.interner.intern(name);
        let id = self
            .modules
            .create(self.heap, Some(name), kind, superclass, env, meta);
        self.top
            .define(name, Value::Object(self.modules.get(id).object().clone()));
        id
    }

    fn include(&mut self, target: ModuleId, module: ModuleId) {
        let included = self.modules.include_module(target, module);
        debug_assert!(included.is_ok(), "bootstrap include rejected");
    }
}

pub(super) fn bootstrap(interner: SharedInterner, config: RuntimeConfig) -> Runtime {
    let names = CoreNames::new(&interner);
    let heap = Heap::new();
    let mut modules = ModuleTable::new();
    let top = EnvRef::top();

    let builtins = {
        let mut boot = Boot {
            interner: &interner,
            heap: &heap,
            modules: &mut modules,
            top: &top,
            class_meta: ModuleId::BOOTSTRAP,
            module_meta: ModuleId::BOOTSTRAP,
        };

        let basic_object = boot.class("BasicObject", None);
        let object = boot.class("Object", Some(basic_object));
        let module = boot.class("Module", Some(object));
        let class = boot.class("Class", Some(module));
        for id in [basic_object, object, module, class] {
            boot.modules.get(id).object().set_class(class);
        }
        boot.class_meta = class;
        boot.module_meta = module;

        let kernel = boot.module("Kernel");
        let comparable = boot.module("Comparable");
        boot.include(object, kernel);

        let numeric = boot.class("Numeric", Some(object));
        boot.include(numeric, comparable);
        let string = boot.class("String", Some(object));
        boot.include(string, comparable);

        let exception = boot.class("Exception", Some(object));
        let standard_error = boot.class("StandardError", Some(exception));
        let name_error = boot.class("NameError", Some(standard_error));
        let argument_error = boot.class("ArgumentError", Some(standard_error));
        let range_error = boot.class("RangeError", Some(standard_error));
        let runtime_error = boot.class("RuntimeError", Some(standard_error));

        Builtins {
            basic_object,
            object,
            module,
            class,
            kernel,
            comparable,
            nil_class: boot.class("NilClass", Some(object)),
            true_class: boot.class("TrueClass", Some(object)),
            false_class: boot.class("FalseClass", Some(object)),
            numeric,
            integer: boot.class("Integer", Some(numeric)),
            float: boot.class("Float", Some(numeric)),
            string,
            symbol: boot.class("Symbol", Some(object)),
            array: boot.class("Array", Some(object)),
            hash: boot.class("Hash", Some(object)),
            regexp: boot.class("Regexp", Some(object)),
            random: boot.class("Random", Some(object)),
            rational: boot.class("Rational", Some(numeric)),
            binding: boot.class("Binding", Some(object)),
            proc_: boot.class("Proc", Some(object)),
            exception,
            script_error: boot.class("ScriptError", Some(exception)),
            standard_error,
            system_stack_error: boot.class("SystemStackError", Some(exception)),
            name_error,
            no_method_error: boot.class("NoMethodError", Some(name_error)),
            type_error: boot.class("TypeError", Some(standard_error)),
            argument_error,
            uncaught_throw_error: boot.class("UncaughtThrowError", Some(argument_error)),
            range_error,
            float_domain_error: boot.class("FloatDomainError", Some(range_error)),
            zero_division_error: boot.class("ZeroDivisionError", Some(standard_error)),
            runtime_error,
            frozen_error: boot.class("FrozenError", Some(runtime_error)),
            local_jump_error: boot.class("LocalJumpError", Some(standard_error)),
        }
    };

    let singletons = Singletons {
        main_object: heap.allocate(builtins.object, ObjectKind::Instance),
        nil: heap.allocate(builtins.nil_class, ObjectKind::Nil),
        true_: heap.allocate(builtins.true_class, ObjectKind::True),
        false_: heap.allocate(builtins.false_class, ObjectKind::False),
    };
    let globals = Globals::new(builtins, top, singletons);
    let counters = config.profile.then(DispatchCounters::default);

    let mut rt = Runtime {
        interner,
        names,
        heap,
        modules,
        globals,
        symbols: FxHashMap::default(),
        config,
        counters,
        frame: None,
        call_depth: 0,
        next_token: 0,
    };
    builtins::install(&mut rt);

    tracing::debug!(
        modules = rt.modules.len(),
        objects = rt.heap.live_objects(),
        "runtime bootstrapped"
    );
    rt
}
