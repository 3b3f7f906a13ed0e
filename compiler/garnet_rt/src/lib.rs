//! Garnet RT - the runtime core behind compiled Garnet programs.
//!
//! Compiled method bodies call into this crate for everything dynamic:
//! sending messages, reading variables, defining classes and unwinding.
//!
//! # Architecture
//!
//! - `Value`: a tagged word; Integers and Floats live unboxed until
//!   something needs their identity, then `hydrate` boxes them in place
//! - `Heap`: allocation registry with a pausable collector audit
//! - `EnvRef`: frames chained by lexical `outer` links and weak `caller` links
//! - `ModuleTable`: the class/module arena, with linearized lookup
//! - `Runtime`: the explicit process context, built by `RuntimeBuilder`
//! - `Runtime::send`: dispatch with an immediate fast path for arithmetic
//! - `Unwind`: `raise`/`throw` as `Err` values aimed at a registered target
//!
//! Logging goes through `tracing`; call [`init_tracing`] once to install a
//! subscriber filtered by `GARNET_LOG` or `RUST_LOG`.

mod builtins;
pub mod config;
pub mod diagnostics;
mod dispatch;
mod environment;
pub mod errors;
mod globals;
mod heap;
mod interned_names;
mod method;
mod module;
mod runtime;
mod stack;
mod unwind;
mod value;

pub use config::{RuntimeConfig, DEFAULT_MAX_CALL_DEPTH};
pub use diagnostics::{init_tracing, DispatchCounters};
pub use dispatch::Intrinsic;
pub use environment::{Env, EnvRef, FrameKind, Provenance};
pub use errors::{ConfigError, UncaughtException};
pub use globals::{Builtins, Globals, MethodMissingReason};
pub use heap::{
    CollectionStats, ExceptionData, GcPause, Heap, HeapObject, MarkTracer, ObjectId, ObjectKind,
    ObjectRef, Trace, Tracer,
};
pub use interned_names::CoreNames;
pub use method::{Arity, Block, BlockRef, Method, MethodBody, MethodFn, MethodRef, Visibility};
pub use module::{IncludeError, Module, ModuleId, ModuleKind, ModuleTable};
pub use runtime::{Runtime, RuntimeBuilder};
pub use stack::ensure_sufficient_stack;
pub use unwind::{Outcome, Raised, RunResult, TargetKind, Thrown, Unwind, UnwindTarget, UnwindToken};
pub use value::Value;

pub use garnet_ir::{Name, SharedInterner};

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests;
