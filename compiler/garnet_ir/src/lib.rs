//! Garnet IR - identifier types shared by the compiler and the runtime.
//!
//! Compiled method bodies and the runtime core agree on one thing before
//! anything else: how a selector or identifier is named. This crate owns that
//! agreement.
//!
//! - `Name`: a 32-bit interned handle, compared by identity
//! - `StringInterner`: the append-only table behind it
//! - `SharedInterner`: the process-wide handle to the table
//! - `StringLookup`: read-only name resolution for downstream crates

mod interner;
mod name;

pub use interner::{InternError, SharedInterner, StringInterner, StringLookup};
pub use name::Name;
