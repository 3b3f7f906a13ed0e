//! Exceptions and escape continuations.
//!
//! Non-local exits travel as an explicit signal in `RunResult`'s error
//! channel and propagate with `?`. Where the signal lands is decided at the
//! raise site: `raise` and `throw` walk the *caller* chain (not the lexical
//! chain) for the nearest frame registered as a matching target and stamp its
//! token into the signal. The registering construct (`rescue`, `catch`) only
//! intercepts signals carrying its own token; everything else passes through.
//!
//! A signal that no frame claims reaches `run_main`, which turns it into an
//! `UncaughtException`.

use crate::environment::{EnvRef, FrameKind};
use crate::errors::{self, UncaughtException};
use crate::heap::{ExceptionData, ObjectKind, ObjectRef};
use crate::module::ModuleId;
use crate::runtime::Runtime;
use crate::value::Value;

/// Result of anything that can raise or throw.
pub type RunResult<T = Value> = Result<T, Unwind>;

/// Identity of one registration of a frame as an unwind target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UnwindToken(u64);

impl UnwindToken {
    pub(crate) fn new(raw: u64) -> Self {
        UnwindToken(raw)
    }
}

#[derive(Clone, Debug)]
pub enum TargetKind {
    /// `begin`/`rescue`: accepts any raised exception.
    Rescue,
    /// `catch(tag)`: accepts throws of the identical tag.
    Catch(Value),
}

#[derive(Clone, Debug)]
pub struct UnwindTarget {
    pub token: UnwindToken,
    pub kind: TargetKind,
}

/// A raised exception on its way to a rescue frame.
#[derive(Clone, Debug)]
pub struct Raised {
    /// The exception object created at the raise site.
    pub exception: ObjectRef,
    /// The rescue registration that will receive it, if any.
    pub target: Option<UnwindToken>,
}

/// A thrown value on its way to its `catch`.
#[derive(Clone, Debug)]
pub struct Thrown {
    pub tag: Value,
    pub value: Value,
    pub target: UnwindToken,
}

/// Non-local exit signal.
#[derive(Clone, Debug)]
pub enum Unwind {
    Raise(Raised),
    Throw(Thrown),
}

impl Unwind {
    /// The exception, if this is a raise.
    pub fn exception(&self) -> Option<&ObjectRef> {
        match self {
            Unwind::Raise(raised) => Some(&raised.exception),
            Unwind::Throw(_) => None,
        }
    }
}

/// How a `rescue` region finished.
#[derive(Clone, Debug)]
pub enum Outcome {
    /// The body returned normally.
    Completed(Value),
    /// An exception addressed to this region was delivered.
    Rescued(Value),
}

/// Nearest target on the caller chain starting at `env` that `accepts` takes.
fn find_target(env: &EnvRef, accepts: impl Fn(&TargetKind) -> bool) -> Option<UnwindToken> {
    let mut frame = Some(env.clone());
    while let Some(current) = frame {
        if let Some(token) = current.find_unwind_target(&accepts) {
            return Some(token);
        }
        frame = current.caller();
    }
    None
}

impl Runtime {
    /// Signal `exception` from `env`.
    ///
    /// Records a backtrace on first raise; a re-raised exception keeps its
    /// original one. Non-exception values raise `TypeError` instead.
    pub fn raise(&mut self, env: &EnvRef, exception: Value) -> Unwind {
        let Some(object) = exception
            .as_reference()
            .filter(|object| object.exception().is_some())
            .cloned()
        else {
            return errors::type_error(self, env, "exception class/object expected");
        };

        if let Some(data) = object.exception() {
            if !data.has_backtrace() {
                data.set_backtrace(self.backtrace(env));
            }
        }
        if let Some(counters) = self.counters.as_mut() {
            counters.count_raise();
        }

        let target = find_target(env, |kind| matches!(kind, TargetKind::Rescue));
        tracing::debug!(
            class = %self.class_name(object.class()),
            handled = target.is_some(),
            "raise"
        );
        Unwind::Raise(Raised {
            exception: object,
            target,
        })
    }

    /// Build an exception of `class` and raise it from `env`.
    pub fn raise_new(&mut self, env: &EnvRef, class: ModuleId, message: impl Into<String>) -> Unwind {
        let exception = self.new_exception(class, message);
        self.raise(env, Value::Object(exception))
    }

    /// Run `body` with `env` registered as a rescue target.
    pub fn rescue(
        &mut self,
        env: &EnvRef,
        body: impl FnOnce(&mut Runtime) -> RunResult,
    ) -> RunResult<Outcome> {
        let token = self.next_unwind_token();
        env.push_unwind_target(UnwindTarget {
            token,
            kind: TargetKind::Rescue,
        });
        let result = body(self);
        env.pop_unwind_target(token);

        match result {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(Unwind::Raise(raised)) if raised.target == Some(token) => {
                let payload = Value::Object(raised.exception);
                env.set_exception(Some(payload.clone()));
                let last_error = self.names.last_error;
                self.globals.global_set(last_error, payload.clone());
                Ok(Outcome::Rescued(payload))
            }
            Err(other) => Err(other),
        }
    }

    /// Run `body` with `env` registered as the catch target for `tag`.
    ///
    /// Returns the thrown value if a matching `throw` escapes `body`.
    pub fn catch(
        &mut self,
        env: &EnvRef,
        tag: Value,
        body: impl FnOnce(&mut Runtime, &Value) -> RunResult,
    ) -> RunResult {
        let token = self.next_unwind_token();
        env.push_unwind_target(UnwindTarget {
            token,
            kind: TargetKind::Catch(tag.clone()),
        });
        let result = body(self, &tag);
        env.pop_unwind_target(token);

        match result {
            Err(Unwind::Throw(thrown)) if thrown.target == token => Ok(thrown.value),
            other => other,
        }
    }

    /// Signal a throw of `value` to the nearest `catch` of `tag`.
    ///
    /// Without a matching catch this raises `UncaughtThrowError` instead.
    pub fn throw(&mut self, env: &EnvRef, tag: Value, value: Value) -> Unwind {
        let accepts = |kind: &TargetKind| matches!(kind, TargetKind::Catch(t) if t.same_object(&tag));
        match find_target(env, accepts) {
            Some(target) => Unwind::Throw(Thrown { tag, value, target }),
            None => {
                let message = format!("uncaught throw {}", self.inspect(&tag));
                let class = self.builtins().uncaught_throw_error;
                self.raise_new(env, class, message)
            }
        }
    }

    /// Run `cleanup` after `body` however `body` exits.
    ///
    /// A signal from `cleanup` replaces the one from `body`.
    pub fn ensure<T>(
        &mut self,
        body: impl FnOnce(&mut Runtime) -> RunResult<T>,
        cleanup: impl FnOnce(&mut Runtime) -> RunResult<()>,
    ) -> RunResult<T> {
        let result = body(self);
        cleanup(self)?;
        result
    }

    /// Run the program body in the main environment.
    ///
    /// This is the top-level boundary: an escaping signal is logged and
    /// returned as `UncaughtException`.
    pub fn run_main(
        &mut self,
        body: impl FnOnce(&mut Runtime, &EnvRef) -> RunResult,
    ) -> Result<Value, UncaughtException> {
        let env = self.main_env().clone();
        match body(self, &env) {
            Ok(value) => Ok(value),
            Err(unwind) => {
                let error = self.uncaught(&env, unwind);
                tracing::error!(class = %error.class_name, "{}", error.message);
                Err(error)
            }
        }
    }

    /// Convert an unclaimed signal into its host-level report.
    pub fn uncaught(&mut self, env: &EnvRef, unwind: Unwind) -> UncaughtException {
        let exception = match unwind {
            Unwind::Raise(raised) => raised.exception,
            Unwind::Throw(thrown) => {
                let message = format!("uncaught throw {}", self.inspect(&thrown.tag));
                let class = self.builtins().uncaught_throw_error;
                let exception = self.new_exception(class, message);
                if let Some(data) = exception.exception() {
                    data.set_backtrace(self.backtrace(env));
                }
                exception
            }
        };
        let (message, backtrace) = exception
            .exception()
            .map(|data| (data.message(), data.backtrace()))
            .unwrap_or_default();
        UncaughtException {
            class_name: self.class_name(exception.class()),
            message,
            backtrace,
        }
    }

    /// Walk the caller chain from `env`, innermost frame first.
    pub fn backtrace(&self, env: &EnvRef) -> Vec<String> {
        let mut frames = Vec::new();
        let mut frame = Some(env.clone());
        while let Some(current) = frame {
            frames.push(self.describe_frame(&current));
            frame = current.caller();
        }
        frames
    }

    fn describe_frame(&self, env: &EnvRef) -> String {
        let location = match env.provenance() {
            Some(provenance) => format!("{}:{}", self.name_str(provenance.file), provenance.line),
            None => self.config.script_name.clone(),
        };
        let method_label = || match env.method_frame().and_then(|frame| frame.method()) {
            Some(method) => self.name_str(method.name()).to_owned(),
            None => "<main>".to_owned(),
        };
        let label = match env.kind() {
            FrameKind::Block => format!("block in {}", method_label()),
            FrameKind::Method | FrameKind::ClosureMethod => method_label(),
            FrameKind::Top | FrameKind::Module => "<main>".to_owned(),
        };
        format!("{location}:in '{label}'")
    }

    /// Allocate an exception object of `class`.
    pub fn new_exception(&self, class: ModuleId, message: impl Into<String>) -> ObjectRef {
        self.heap
            .allocate(class, ObjectKind::Exception(ExceptionData::new(message)))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests;
