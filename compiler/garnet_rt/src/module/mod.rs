//! Class/module arena and method resolution.
//!
//! Modules live in a single `ModuleTable` that outlives every instance.
//! Superclass, include and owner links are `ModuleId` indices into it, so the
//! hierarchy never forms an ownership cycle.
//!
//! Resolution order for an instance method on class `C`:
//!
//! 1. `C`'s own method table
//! 2. modules included into `C`, most recently included first (each expanded
//!    with its own includes)
//! 3. the same steps on `C`'s superclass, up to the root

use std::fmt;

use garnet_ir::Name;
use rustc_hash::FxHashMap;

use crate::environment::EnvRef;
use crate::heap::{Heap, ObjectKind, ObjectRef, Trace, Tracer};
use crate::method::{Method, MethodRef};

/// Index of a class or module in the `ModuleTable`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
    /// Placeholder class used only while bootstrapping the first class objects.
    pub(crate) const BOOTSTRAP: ModuleId = ModuleId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModuleKind {
    Class,
    Module,
}

/// Why `include_module` refused an include.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IncludeError {
    /// The module already has the target among its ancestors.
    Cyclic,
    /// Only modules can be included.
    NotAModule,
}

pub struct Module {
    id: ModuleId,
    name: Option<Name>,
    kind: ModuleKind,
    superclass: Option<ModuleId>,
    includes: Vec<ModuleId>,
    methods: FxHashMap<Name, MethodRef>,
    singleton_methods: FxHashMap<Name, MethodRef>,
    /// Defining environment; holds the module's constants.
    env: EnvRef,
    /// The class object that represents this module as a receiver.
    object: ObjectRef,
}

impl Module {
    #[inline]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> Option<Name> {
        self.name
    }

    #[inline]
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    #[inline]
    pub fn is_class(&self) -> bool {
        self.kind == ModuleKind::Class
    }

    #[inline]
    pub fn superclass(&self) -> Option<ModuleId> {
        self.superclass
    }

    /// Included modules in inclusion order.
    pub fn includes(&self) -> &[ModuleId] {
        &self.includes
    }

    #[inline]
    pub fn env(&self) -> &EnvRef {
        &self.env
    }

    #[inline]
    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    /// Entry in this module's own table, undefined placeholders included.
    pub fn own_method(&self, name: Name) -> Option<&MethodRef> {
        self.methods.get(&name)
    }

    pub fn own_singleton_method(&self, name: Name) -> Option<&MethodRef> {
        self.singleton_methods.get(&name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = Name> + '_ {
        self.methods.keys().copied()
    }
}

impl Trace for Module {
    fn trace(&self, tracer: &mut dyn Tracer) {
        if let Some(superclass) = self.superclass {
            tracer.mark_module(superclass);
        }
        for &include in &self.includes {
            tracer.mark_module(include);
        }
        for method in self.methods.values().chain(self.singleton_methods.values()) {
            method.trace(tracer);
        }
        self.env.trace(tracer);
        self.object.trace(tracer);
    }
}

/// Arena of every class and module.
#[derive(Default)]
pub struct ModuleTable {
    modules: Vec<Module>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a module and its class object.
    ///
    /// `meta` is the class of the class object (`Class` or `Module`); during
    /// bootstrap, before those exist, callers pass `ModuleId::BOOTSTRAP` and
    /// fix the objects up afterwards.
    pub fn create(
        &mut self,
        heap: &Heap,
        name: Option<Name>,
        kind: ModuleKind,
        superclass: Option<ModuleId>,
        env: EnvRef,
        meta: ModuleId,
    ) -> ModuleId {
        let index = u32::try_from(self.modules.len()).unwrap_or(u32::MAX);
        let id = ModuleId(index);
        let object = heap.allocate(meta, ObjectKind::Module(id));
        self.modules.push(Module {
            id,
            name,
            kind,
            superclass,
            includes: Vec::new(),
            methods: FxHashMap::default(),
            singleton_methods: FxHashMap::default(),
            env,
            object,
        });
        id
    }

    /// # Panics
    /// Panics if `id` did not come from this table.
    #[inline]
    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    #[inline]
    fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// Replace any existing entry for the method's name in `owner`.
    pub fn define_method(&mut self, owner: ModuleId, method: Method) -> MethodRef {
        let method = MethodRef::new(method);
        self.get_mut(owner)
            .methods
            .insert(method.name(), MethodRef::clone(&method));
        method
    }

    pub fn define_singleton_method(&mut self, owner: ModuleId, method: Method) -> MethodRef {
        let method = MethodRef::new(method);
        self.get_mut(owner)
            .singleton_methods
            .insert(method.name(), MethodRef::clone(&method));
        method
    }

    /// Delete `owner`'s own entry. Lookup then continues to ancestors.
    pub fn remove_method(&mut self, owner: ModuleId, name: Name) -> Option<MethodRef> {
        self.get_mut(owner).methods.remove(&name)
    }

    /// Shadow `name` with an undefined placeholder that stops lookup.
    pub fn undef_method(&mut self, owner: ModuleId, name: Name) {
        self.define_method(owner, Method::undefined(name, owner));
    }

    /// Append `module` to `target`'s include list.
    ///
    /// Duplicates are allowed and create a second entry.
    pub fn include_module(&mut self, target: ModuleId, module: ModuleId) -> Result<(), IncludeError> {
        if self.get(module).is_class() {
            return Err(IncludeError::NotAModule);
        }
        if module == target || self.ancestors(module).contains(&target) {
            return Err(IncludeError::Cyclic);
        }
        self.get_mut(target).includes.push(module);
        Ok(())
    }

    /// Search `id`'s own table, then its includes most recent first.
    fn lookup_in_module(&self, id: ModuleId, name: Name) -> Option<&MethodRef> {
        let module = self.get(id);
        if let Some(method) = module.methods.get(&name) {
            return Some(method);
        }
        module
            .includes
            .iter()
            .rev()
            .find_map(|&include| self.lookup_in_module(include, name))
    }

    /// Resolve an instance method, walking superclasses.
    ///
    /// May return an undefined placeholder; callers treat it as a miss.
    pub fn find_method(&self, class: ModuleId, name: Name) -> Option<MethodRef> {
        let mut current = Some(class);
        while let Some(id) = current {
            if let Some(method) = self.lookup_in_module(id, name) {
                return Some(MethodRef::clone(method));
            }
            current = self.get(id).superclass;
        }
        None
    }

    /// Resolve a class-level method: the module's own singleton table, then
    /// each superclass's.
    pub fn find_singleton_method(&self, module: ModuleId, name: Name) -> Option<MethodRef> {
        let mut current = Some(module);
        while let Some(id) = current {
            let module = self.get(id);
            if let Some(method) = module.singleton_methods.get(&name) {
                return Some(MethodRef::clone(method));
            }
            current = module.superclass;
        }
        None
    }

    /// Resolve `name` in the ancestors of `class` that come after the
    /// current method's position, returning the new position with the method.
    ///
    /// Without a recorded `position` the first occurrence of `owner` is used;
    /// plain lookup always finds a method there.
    pub fn find_method_after(
        &self,
        class: ModuleId,
        owner: ModuleId,
        name: Name,
        position: Option<usize>,
    ) -> Option<(usize, MethodRef)> {
        let ancestors = self.ancestors(class);
        let start = match position {
            Some(index) if ancestors.get(index) == Some(&owner) => index,
            _ => ancestors.iter().position(|&id| id == owner)?,
        };
        ancestors
            .iter()
            .enumerate()
            .skip(start + 1)
            .find_map(|(index, &id)| Some((index, MethodRef::clone(self.get(id).methods.get(&name)?))))
    }

    /// Class-level counterpart of `find_method_after`.
    pub fn find_singleton_method_after(&self, module: ModuleId, owner: ModuleId, name: Name) -> Option<MethodRef> {
        let mut current = Some(module);
        let mut passed = false;
        while let Some(id) = current {
            let module = self.get(id);
            if passed {
                if let Some(method) = module.singleton_methods.get(&name) {
                    return Some(MethodRef::clone(method));
                }
            }
            passed |= id == owner;
            current = module.superclass;
        }
        None
    }

    /// Linearized ancestors of `id`, in resolution order.
    pub fn ancestors(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut out = Vec::new();
        let mut current = Some(id);
        while let Some(class) = current {
            self.push_with_includes(class, &mut out);
            current = self.get(class).superclass;
        }
        out
    }

    fn push_with_includes(&self, id: ModuleId, out: &mut Vec<ModuleId>) {
        out.push(id);
        for &include in self.get(id).includes.iter().rev() {
            self.push_with_includes(include, out);
        }
    }

    /// `ancestor` appears in `id`'s linearized ancestors.
    pub fn inherits(&self, id: ModuleId, ancestor: ModuleId) -> bool {
        id == ancestor || self.ancestors(id).contains(&ancestor)
    }

    /// Superclass chain only, starting at `id`.
    pub fn superclass_chain(&self, id: ModuleId) -> impl Iterator<Item = ModuleId> + '_ {
        std::iter::successors(Some(id), |&current| self.get(current).superclass)
    }
}

impl Trace for ModuleTable {
    fn trace(&self, tracer: &mut dyn Tracer) {
        // The arena outlives every instance, so each module is a root.
        for module in &self.modules {
            tracer.mark_module(module.id);
            module.trace(tracer);
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
