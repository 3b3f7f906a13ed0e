//! Message dispatch.
//!
//! Every send runs the same state machine:
//!
//! ```text
//! Start -> FastPathCheck -> FastPathExecute                       -> Return
//!                        \-> Hydrate -> Resolve -> Invoke          -> Return
//!                                              \-> method_missing  -> Return
//! ```
//!
//! The fast path is taken only for an immediate receiver, a selector on its
//! class's allowlist, exactly one argument, and a resolved public method that
//! still carries the matching `Intrinsic` tag. Redefining `Integer#+` drops
//! the tag, so the redefinition is seen by every later send.

mod intrinsics;

pub use intrinsics::Intrinsic;
pub(crate) use intrinsics::native_entry;

use garnet_ir::Name;
use smallvec::SmallVec;

use crate::environment::EnvRef;
use crate::errors;
use crate::globals::MethodMissingReason;
use crate::heap::{ObjectKind, ObjectRef};
use crate::method::{BlockRef, MethodRef, Visibility};
use crate::runtime::Runtime;
use crate::unwind::RunResult;
use crate::value::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SendKind {
    /// `send`: any visibility.
    Any,
    /// `public_send`: public methods only.
    Public,
}

impl Runtime {
    /// Send `name` to `receiver`, ignoring visibility.
    ///
    /// `receiver` is hydrated in place when the general path is taken.
    pub fn send(
        &mut self,
        env: &EnvRef,
        receiver: &mut Value,
        name: Name,
        args: &[Value],
        block: Option<&BlockRef>,
    ) -> RunResult {
        self.dispatch(env, receiver, name, args, block, SendKind::Any)
    }

    /// Send `name` to `receiver`; private and protected methods raise.
    pub fn public_send(
        &mut self,
        env: &EnvRef,
        receiver: &mut Value,
        name: Name,
        args: &[Value],
        block: Option<&BlockRef>,
    ) -> RunResult {
        self.dispatch(env, receiver, name, args, block, SendKind::Public)
    }

    fn dispatch(
        &mut self,
        env: &EnvRef,
        receiver: &mut Value,
        name: Name,
        args: &[Value],
        block: Option<&BlockRef>,
        kind: SendKind,
    ) -> RunResult {
        if let Some(counters) = self.counters.as_mut() {
            counters.count_send();
        }

        if let Some(result) = self.try_fast_path(env, receiver, name, args) {
            return result;
        }

        if receiver.is_immediate() {
            if let Some(counters) = self.counters.as_mut() {
                counters.count_hydration();
            }
        }
        let object = receiver.hydrate(self);
        tracing::trace!(
            class = %self.class_name(object.class()),
            selector = self.name_str(name),
            "general dispatch"
        );

        let method = match self.resolve(&object, name) {
            Some(method) if !method.is_undefined() => method,
            _ => {
                return self.method_missing(env, object, name, args, block, MethodMissingReason::Undefined);
            }
        };

        if kind == SendKind::Public {
            let reason = match method.visibility() {
                Visibility::Public => None,
                Visibility::Private => Some(MethodMissingReason::Private),
                Visibility::Protected => Some(MethodMissingReason::Protected),
            };
            if let Some(reason) = reason {
                return self.method_missing(env, object, name, args, block, reason);
            }
        }

        method.invoke(self, env, Value::Object(object), args, block)
    }

    /// Run an allowlisted operator directly on an immediate receiver.
    ///
    /// Returns `None` when any fast-path precondition fails.
    fn try_fast_path(&mut self, env: &EnvRef, receiver: &Value, name: Name, args: &[Value]) -> Option<RunResult> {
        let (class, op) = match receiver {
            Value::Integer(_) => (self.builtins().integer, self.names.integer_intrinsic(name)?),
            Value::Float(_) => (self.builtins().float, self.names.float_intrinsic(name)?),
            Value::Object(_) => return None,
        };
        let [rhs] = args else {
            return None;
        };
        let method = self.modules.find_method(class, name)?;
        if method.intrinsic() != Some(op) || method.visibility() != Visibility::Public {
            return None;
        }

        if let Some(counters) = self.counters.as_mut() {
            counters.count_fast_path();
        }
        tracing::trace!(selector = self.name_str(name), "fast path");
        Some(intrinsics::apply(self, env, op, receiver, rhs))
    }

    /// Find the method `name` resolves to on `object`.
    ///
    /// Order: the object's own singleton methods; for a class object, its
    /// class-level methods and those of its superclasses; then the instance
    /// methods of the object's class and its ancestors.
    pub fn resolve(&self, object: &ObjectRef, name: Name) -> Option<MethodRef> {
        if let Some(method) = object.singleton_method(name) {
            return Some(method);
        }
        if let Some(module) = object.module_id() {
            if let Some(method) = self.modules.find_singleton_method(module, name) {
                return Some(method);
            }
        }
        self.modules.find_method(object.class(), name)
    }

    /// Fallback after a failed resolution or a visibility violation.
    fn method_missing(
        &mut self,
        env: &EnvRef,
        object: ObjectRef,
        name: Name,
        args: &[Value],
        block: Option<&BlockRef>,
        reason: MethodMissingReason,
    ) -> RunResult {
        self.globals.set_method_missing_reason(reason);
        if let Some(counters) = self.counters.as_mut() {
            counters.count_method_missing();
        }

        let handler = self
            .resolve(&object, self.names.method_missing)
            .filter(|method| !method.is_undefined());
        if let Some(handler) = handler {
            let mut forwarded: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len() + 1);
            forwarded.push(self.symbol(name));
            forwarded.extend(args.iter().cloned());
            return handler.invoke(self, env, Value::Object(object), &forwarded, block);
        }

        let receiver = Value::Object(object);
        let selector = self.name_str(name);
        let subject = self.describe_receiver(&receiver);
        let message = match reason {
            MethodMissingReason::Undefined => format!("undefined method '{selector}' for {subject}"),
            MethodMissingReason::Private => format!("private method '{selector}' called for {subject}"),
            MethodMissingReason::Protected => {
                format!("protected method '{selector}' called for {subject}")
            }
        };
        Err(errors::no_method_error(self, env, message, name))
    }

    /// Whether `value` would answer `name`.
    pub fn respond_to(&self, value: &Value, name: Name, include_private: bool) -> bool {
        let method = match value {
            Value::Object(object) => self.resolve(object, name),
            immediate => self.modules.find_method(self.class_of(immediate), name),
        };
        method.is_some_and(|method| {
            !method.is_undefined() && (include_private || method.visibility() == Visibility::Public)
        })
    }

    /// Resolve a bare identifier: a visible variable or constant first, then a
    /// send to `receiver`.
    pub fn lookup_or_send(
        &mut self,
        env: &EnvRef,
        receiver: &mut Value,
        name: Name,
        args: &[Value],
    ) -> RunResult {
        if args.is_empty() {
            if let Some(value) = env.lookup(name, &self.interner) {
                return Ok(value);
            }
        }
        self.send(env, receiver, name, args, None)
    }

    /// Invoke the next definition of the current method above its owner.
    ///
    /// Without an explicit block, the current method's block is passed on.
    pub fn call_super(
        &mut self,
        env: &EnvRef,
        receiver: &mut Value,
        args: &[Value],
        block: Option<&BlockRef>,
    ) -> RunResult {
        let Some(frame) = env.method_frame() else {
            return Err(errors::runtime_error(self, env, "super called outside of method"));
        };
        let position = frame.ancestor_index();
        let Some(current) = frame.method() else {
            return Err(errors::runtime_error(self, env, "super called outside of method"));
        };
        let name = current.name();
        let owner = current.owner();
        let object = receiver.hydrate(self);

        let is_class_method = self
            .modules
            .get(owner)
            .own_singleton_method(name)
            .is_some_and(|method| MethodRef::ptr_eq(method, &current));
        let found = match object.module_id() {
            Some(module) if is_class_method => self
                .modules
                .find_singleton_method_after(module, owner, name)
                .map(|method| (None, method)),
            _ => self
                .modules
                .find_method_after(object.class(), owner, name, position)
                .map(|(index, method)| (Some(index), method)),
        };

        let block = block.cloned().or_else(|| env.current_block());
        match found.filter(|(_, method)| !method.is_undefined()) {
            Some((index, method)) => {
                method.invoke_at(self, env, Value::Object(object), args, block.as_ref(), index)
            }
            None => {
                let message = format!(
                    "super: no superclass method '{}' for {}",
                    self.name_str(name),
                    self.describe_receiver(&Value::Object(object))
                );
                Err(errors::no_method_error(self, env, message, name))
            }
        }
    }

    /// Receiver phrase used in `NoMethodError` messages.
    pub fn describe_receiver(&self, value: &Value) -> String {
        let Value::Object(object) = value else {
            return format!("an instance of {}", self.class_name(self.class_of(value)));
        };
        match object.kind() {
            ObjectKind::Nil => "nil".to_owned(),
            ObjectKind::True => "true".to_owned(),
            ObjectKind::False => "false".to_owned(),
            ObjectKind::Module(id) => {
                let noun = if self.modules.get(*id).is_class() { "class" } else { "module" };
                format!("{noun} {}", self.class_name(*id))
            }
            _ => format!("an instance of {}", self.class_name(object.class())),
        }
    }

    /// Operand phrase used in coercion and comparison errors.
    pub(crate) fn describe_operand(&self, value: &Value) -> String {
        match value.as_reference().map(|object| object.kind()) {
            Some(ObjectKind::Nil | ObjectKind::True | ObjectKind::False) => self.inspect(value),
            _ => self.class_name(self.class_of(value)),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
