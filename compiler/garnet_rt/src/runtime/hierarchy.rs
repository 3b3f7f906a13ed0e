//! Hierarchy maintenance and object queries.
//!
//! These are the `Runtime`-level entry points over `ModuleTable`: they raise
//! through the unwind mechanism where the table only reports failure, and
//! they keep constants and class objects in step with the arena.

use garnet_ir::Name;

use super::Runtime;
use crate::environment::{EnvRef, FrameKind};
use crate::errors;
use crate::heap::ObjectKind;
use crate::method::{Arity, Method, MethodBody, MethodRef, Visibility};
use crate::module::{IncludeError, ModuleId, ModuleKind};
use crate::unwind::RunResult;
use crate::value::Value;

impl Runtime {
    /// Open class `name` in `lexical`, creating it if needed.
    ///
    /// A new class defaults to `Object` as superclass, gets an environment
    /// chained to its superclass's, and is bound as a constant in `lexical`.
    /// Reopening with a different explicit superclass raises `TypeError`.
    pub fn define_class(
        &mut self,
        lexical: &EnvRef,
        name: Name,
        superclass: Option<ModuleId>,
    ) -> RunResult<ModuleId> {
        if let Some(existing) = lexical.lookup_local(name) {
            let id = match existing.as_reference().and_then(|object| object.module_id()) {
                Some(id) if self.modules.get(id).is_class() => id,
                _ => {
                    let message = format!("{} is not a class", self.name_str(name));
                    return Err(errors::type_error(self, lexical, message));
                }
            };
            if superclass.is_some_and(|requested| Some(requested) != self.modules.get(id).superclass()) {
                let message = format!("superclass mismatch for class {}", self.name_str(name));
                return Err(errors::type_error(self, lexical, message));
            }
            return Ok(id);
        }

        let superclass = superclass.unwrap_or(self.builtins().object);
        let env = self.modules.get(superclass).env().child(FrameKind::Module);
        let meta = self.builtins().class;
        let id = self
            .modules
            .create(&self.heap, Some(name), ModuleKind::Class, Some(superclass), env, meta);
        lexical.define(name, Value::Object(self.modules.get(id).object().clone()));
        tracing::debug!(class = self.name_str(name), "defined class");
        Ok(id)
    }

    /// Open module `name` in `lexical`, creating it if needed.
    pub fn define_module(&mut self, lexical: &EnvRef, name: Name) -> RunResult<ModuleId> {
        if let Some(existing) = lexical.lookup_local(name) {
            return match existing.as_reference().and_then(|object| object.module_id()) {
                Some(id) if !self.modules.get(id).is_class() => Ok(id),
                _ => {
                    let message = format!("{} is not a module", self.name_str(name));
                    Err(errors::type_error(self, lexical, message))
                }
            };
        }

        let env = lexical.child(FrameKind::Module);
        let meta = self.builtins().module;
        let id = self
            .modules
            .create(&self.heap, Some(name), ModuleKind::Module, None, env, meta);
        lexical.define(name, Value::Object(self.modules.get(id).object().clone()));
        tracing::debug!(module = self.name_str(name), "defined module");
        Ok(id)
    }

    /// Install `method` in its owner's table, replacing any previous entry.
    pub fn define_method(&mut self, method: Method) -> MethodRef {
        tracing::trace!(
            owner = %self.class_name(method.owner()),
            method = self.name_str(method.name()),
            "define method"
        );
        self.modules.define_method(method.owner(), method)
    }

    /// Install a native method on `owner`.
    pub fn define_native(
        &mut self,
        owner: ModuleId,
        name: &str,
        arity: Arity,
        entry: crate::method::MethodFn,
    ) -> MethodRef {
        let name = self.intern(name);
        self.define_method(Method::native(name, owner, arity, entry))
    }

    /// Define a method directly on one object.
    ///
    /// On a class or module object this is a class-level method, inherited by
    /// subclasses. Numbers, immediate or boxed, have no singleton, so they
    /// raise `TypeError`.
    pub fn define_singleton_method(
        &mut self,
        env: &EnvRef,
        target: &Value,
        name: Name,
        arity: Arity,
        body: MethodBody,
    ) -> RunResult<MethodRef> {
        let Some(object) = target.as_reference().filter(|object| !object.is_boxed_numeric()) else {
            return Err(errors::type_error(self, env, "can't define singleton"));
        };
        if let Some(module) = object.module_id() {
            let method = Method::new(name, module, arity, body);
            return Ok(self.modules.define_singleton_method(module, method));
        }
        let method = MethodRef::new(Method::new(name, object.class(), arity, body));
        object.define_singleton_method(MethodRef::clone(&method));
        Ok(method)
    }

    /// Append `module` to `target`'s includes.
    pub fn include_module(&mut self, env: &EnvRef, target: ModuleId, module: ModuleId) -> RunResult<()> {
        match self.modules.include_module(target, module) {
            Ok(()) => Ok(()),
            Err(IncludeError::Cyclic) => Err(errors::argument_error(self, env, "cyclic include detected")),
            Err(IncludeError::NotAModule) => {
                let message = format!(
                    "wrong argument type Class (expected Module): {}",
                    self.class_name(module)
                );
                Err(errors::type_error(self, env, message))
            }
        }
    }

    /// Delete `owner`'s own definition of `name`; lookup continues upward.
    pub fn remove_method(&mut self, env: &EnvRef, owner: ModuleId, name: Name) -> RunResult<()> {
        if self.modules.remove_method(owner, name).is_some() {
            return Ok(());
        }
        let message = format!(
            "method '{}' not defined in {}",
            self.name_str(name),
            self.class_name(owner)
        );
        Err(errors::name_error(self, env, message, name))
    }

    /// Make `name` undefined for `owner` and its descendants.
    pub fn undef_method(&mut self, env: &EnvRef, owner: ModuleId, name: Name) -> RunResult<()> {
        if !self.is_method_defined(owner, name) {
            return Err(self.undefined_in(env, owner, name));
        }
        self.modules.undef_method(owner, name);
        Ok(())
    }

    /// Re-tag `name` on `owner` with `visibility`.
    ///
    /// An inherited method gets a copy in `owner` so the ancestor is unchanged.
    pub fn set_visibility(
        &mut self,
        env: &EnvRef,
        owner: ModuleId,
        name: Name,
        visibility: Visibility,
    ) -> RunResult<()> {
        let method = match self.modules.find_method(owner, name) {
            Some(method) if !method.is_undefined() => method,
            _ => return Err(self.undefined_in(env, owner, name)),
        };
        let retagged = method.clone_with_visibility(visibility);
        self.modules.define_method(owner, retagged);
        Ok(())
    }

    fn is_method_defined(&self, owner: ModuleId, name: Name) -> bool {
        self.modules
            .find_method(owner, name)
            .is_some_and(|method| !method.is_undefined())
    }

    #[cold]
    fn undefined_in(&mut self, env: &EnvRef, owner: ModuleId, name: Name) -> crate::unwind::Unwind {
        let noun = if self.modules.get(owner).is_class() { "class" } else { "module" };
        let message = format!(
            "undefined method '{}' for {noun} '{}'",
            self.name_str(name),
            self.class_name(owner)
        );
        errors::name_error(self, env, message, name)
    }

    /// Read an instance variable; unset variables and numbers read `nil`.
    pub fn ivar_get(&mut self, env: &EnvRef, receiver: &Value, name: Name) -> RunResult {
        self.check_ivar_name(env, name)?;
        Ok(receiver
            .as_reference()
            .filter(|object| !object.is_boxed_numeric())
            .and_then(|object| object.ivar(name))
            .unwrap_or_else(|| self.nil()))
    }

    /// Write an instance variable. Numbers are frozen whether or not they
    /// have been hydrated.
    pub fn ivar_set(&mut self, env: &EnvRef, receiver: &Value, name: Name, value: Value) -> RunResult {
        self.check_ivar_name(env, name)?;
        let Some(object) = receiver.as_reference().filter(|object| !object.is_boxed_numeric()) else {
            return Err(errors::frozen_error(self, env, receiver));
        };
        object.set_ivar(name, value.clone());
        Ok(value)
    }

    fn check_ivar_name(&mut self, env: &EnvRef, name: Name) -> RunResult<()> {
        let text = self.name_str(name);
        if text.len() > 1 && text.starts_with('@') && !text.starts_with("@@") {
            Ok(())
        } else {
            Err(errors::invalid_ivar_name(self, env, name))
        }
    }

    /// Class of `value`, without hydrating.
    pub fn class_of(&self, value: &Value) -> ModuleId {
        match value {
            Value::Integer(_) => self.builtins().integer,
            Value::Float(_) => self.builtins().float,
            Value::Object(object) => object.class(),
        }
    }

    /// `value.is_a?(class)`.
    pub fn is_a(&self, value: &Value, class: ModuleId) -> bool {
        self.modules.inherits(self.class_of(value), class)
    }

    /// Resolution order of `id`.
    pub fn ancestors(&self, id: ModuleId) -> Vec<ModuleId> {
        self.modules.ancestors(id)
    }

    /// The module a class or module object stands for.
    pub fn module_of(&self, value: &Value) -> Option<ModuleId> {
        value.as_reference().and_then(|object| object.module_id())
    }

    /// `object_id`.
    ///
    /// Integers report `2n + 1`, boxed or not, and an immediate stays
    /// immediate. A Float is hydrated first, so its id belongs to the new heap
    /// object. Heap objects report twice their sequential id, which keeps them
    /// apart from integer ids.
    pub fn object_id(&self, value: &mut Value) -> i64 {
        if let Some(i) = value.as_integer() {
            return i.wrapping_mul(2).wrapping_add(1);
        }
        let object = value.hydrate(self);
        i64::try_from(object.id().raw())
            .unwrap_or(i64::MAX)
            .wrapping_mul(2)
    }

    /// Whether `value` is an exception object.
    pub fn is_exception(&self, value: &Value) -> bool {
        value
            .as_reference()
            .is_some_and(|object| matches!(object.kind(), ObjectKind::Exception(_)))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
