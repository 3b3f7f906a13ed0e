//! Pre-interned names for hot-path dispatch.
//!
//! Interned once when the `Runtime` is built so the dispatch loop compares
//! `Name`s (`u32 == u32`) instead of hashing strings.

use garnet_ir::{Name, StringInterner};

use crate::dispatch::Intrinsic;

/// Selectors and identifiers the core refers to by name.
#[derive(Clone, Copy, Debug)]
pub struct CoreNames {
    pub nil: Name,
    pub true_: Name,
    pub false_: Name,
    pub self_: Name,
    pub initialize: Name,
    pub method_missing: Name,
    pub respond_to: Name,
    pub send: Name,
    pub public_send: Name,
    pub new: Name,
    pub allocate: Name,
    pub message: Name,
    pub last_error: Name,

    pub add: Name,
    pub sub: Name,
    pub mul: Name,
    pub div: Name,
    pub rem: Name,
    pub lt: Name,
    pub le: Name,
    pub gt: Name,
    pub ge: Name,
    pub eq: Name,
    pub cmp: Name,
}

impl CoreNames {
    pub(crate) fn new(interner: &StringInterner) -> Self {
        Self {
            nil: interner.intern("nil"),
            true_: interner.intern("true"),
            false_: interner.intern("false"),
            self_: interner.intern("self"),
            initialize: interner.intern("initialize"),
            method_missing: interner.intern("method_missing"),
            respond_to: interner.intern("respond_to?"),
            send: interner.intern("send"),
            public_send: interner.intern("public_send"),
            new: interner.intern("new"),
            allocate: interner.intern("allocate"),
            message: interner.intern("message"),
            last_error: interner.intern("$!"),
            add: interner.intern("+"),
            sub: interner.intern("-"),
            mul: interner.intern("*"),
            div: interner.intern("/"),
            rem: interner.intern("%"),
            lt: interner.intern("<"),
            le: interner.intern("<="),
            gt: interner.intern(">"),
            ge: interner.intern(">="),
            eq: interner.intern("=="),
            cmp: interner.intern("<=>"),
        }
    }

    /// The operator an Integer receiver may run without hydrating.
    pub fn integer_intrinsic(&self, name: Name) -> Option<Intrinsic> {
        self.float_intrinsic(name)
            .or_else(|| (name == self.rem).then_some(Intrinsic::Mod))
    }

    /// The operator a Float receiver may run without hydrating.
    pub fn float_intrinsic(&self, name: Name) -> Option<Intrinsic> {
        let table = [
            (self.add, Intrinsic::Add),
            (self.sub, Intrinsic::Sub),
            (self.mul, Intrinsic::Mul),
            (self.div, Intrinsic::Div),
            (self.lt, Intrinsic::Lt),
            (self.le, Intrinsic::Le),
            (self.gt, Intrinsic::Gt),
            (self.ge, Intrinsic::Ge),
            (self.eq, Intrinsic::Eq),
            (self.cmp, Intrinsic::Cmp),
        ];
        table
            .iter()
            .find(|(selector, _)| *selector == name)
            .map(|&(_, op)| op)
    }

    /// Selector text for an intrinsic.
    pub fn selector(&self, op: Intrinsic) -> Name {
        match op {
            Intrinsic::Add => self.add,
            Intrinsic::Sub => self.sub,
            Intrinsic::Mul => self.mul,
            Intrinsic::Div => self.div,
            Intrinsic::Mod => self.rem,
            Intrinsic::Lt => self.lt,
            Intrinsic::Le => self.le,
            Intrinsic::Gt => self.gt,
            Intrinsic::Ge => self.ge,
            Intrinsic::Eq => self.eq,
            Intrinsic::Cmp => self.cmp,
        }
    }
}
