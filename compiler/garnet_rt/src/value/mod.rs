//! The tagged value passed through the whole runtime.
//!
//! A `Value` is either an immediate (`Integer`, `Float`) that travels without
//! touching the heap, or a reference to a heap object. `hydrate` is the only
//! path that turns an immediate into a heap object, and it is one-way: once a
//! slot is hydrated, every later operation on it sees the same object.
//!
//! Identity is part of the contract. Two immediates with the same payload are
//! indistinguishable, but two separately hydrated copies of the same integer
//! are distinct heap objects.

use std::fmt;

use garnet_ir::Name;

use crate::environment::EnvRef;
use crate::heap::{ObjectKind, ObjectRef, Trace, Tracer};
use crate::method::BlockRef;
use crate::runtime::Runtime;
use crate::unwind::RunResult;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    /// Immediate integer, never heap-allocated.
    Integer(i64),
    /// Immediate float, never heap-allocated.
    Float(f64),
    /// Reference to a heap object.
    Object(ObjectRef),
}

impl Value {
    #[inline]
    pub fn immediate_integer(i: i64) -> Self {
        Value::Integer(i)
    }

    #[inline]
    pub fn immediate_float(x: f64) -> Self {
        Value::Float(x)
    }

    #[inline]
    pub fn is_immediate_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    #[inline]
    pub fn is_immediate_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    #[inline]
    pub fn is_immediate(&self) -> bool {
        !matches!(self, Value::Object(_))
    }

    /// The heap object, if this value is a reference.
    #[inline]
    pub fn as_reference(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Integer payload, looking through a hydrated Integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Object(object) => match object.kind() {
                ObjectKind::Integer(i) => Some(*i),
                _ => None,
            },
            Value::Float(_) => None,
        }
    }

    /// Float payload, looking through a hydrated Float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Object(object) => match object.kind() {
                ObjectKind::Float(x) => Some(*x),
                _ => None,
            },
            Value::Integer(_) => None,
        }
    }

    /// Symbol name, if this value is a Symbol.
    pub fn as_symbol(&self) -> Option<Name> {
        match self.as_reference()?.kind() {
            ObjectKind::Symbol(name) => Some(*name),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        self.as_reference()
            .is_some_and(|object| matches!(object.kind(), ObjectKind::Nil))
    }

    /// Everything except `nil` and `false` is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Object(object) => !matches!(object.kind(), ObjectKind::Nil | ObjectKind::False),
            _ => true,
        }
    }

    /// Identity comparison.
    ///
    /// Immediates compare by payload (floats bitwise), references by heap
    /// identity. An immediate is never the same object as a reference.
    pub fn same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Object(a), Value::Object(b)) => ObjectRef::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Box an immediate into its heap wrapper and return the object.
    ///
    /// No-op for references. Runs with collection paused so the slot is never
    /// observed half-converted.
    pub fn hydrate(&mut self, rt: &Runtime) -> ObjectRef {
        let (class, kind) = match self {
            Value::Object(object) => return object.clone(),
            Value::Integer(i) => (rt.builtins().integer, ObjectKind::Integer(*i)),
            Value::Float(x) => (rt.builtins().float, ObjectKind::Float(*x)),
        };

        let _pause = rt.heap().pause();
        let object = rt.heap().allocate(class, kind);
        tracing::trace!(object = ?object, "hydrated immediate");
        *self = Value::Object(object.clone());
        object
    }

    /// Dispatch `name` to this value, ignoring visibility.
    pub fn send(
        &mut self,
        rt: &mut Runtime,
        env: &EnvRef,
        name: Name,
        args: &[Value],
        block: Option<&BlockRef>,
    ) -> RunResult {
        rt.send(env, self, name, args, block)
    }

    /// Dispatch `name` to this value, allowing only public methods.
    pub fn public_send(
        &mut self,
        rt: &mut Runtime,
        env: &EnvRef,
        name: Name,
        args: &[Value],
        block: Option<&BlockRef>,
    ) -> RunResult {
        rt.public_send(env, self, name, args, block)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

/// Immediates compare numerically with each other and with hydrated numerics;
/// references otherwise compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) if ObjectRef::ptr_eq(a, b) => true,
            _ => match (self.as_integer(), other.as_integer()) {
                (Some(a), Some(b)) => a == b,
                _ => match (self.as_float(), other.as_float()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "Integer({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Object(object) => write!(f, "{object:?}"),
        }
    }
}

impl Trace for Value {
    fn trace(&self, tracer: &mut dyn Tracer) {
        if let Value::Object(object) = self {
            object.trace(tracer);
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
