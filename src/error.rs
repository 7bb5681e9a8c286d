//! Runtime error taxonomy (spec §7).
//!
//! Every variant here is fatal except [`Error::FixnumOverflow`], which a
//! front-end may choose to treat as fatal as well — this crate's own
//! policy (spec §9 Open Questions) is that it propagates like any other
//! error rather than being silently substituted with `unspecified`.

use crate::value::Value;
use core::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// A runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Error {
    /// Allocation could not be satisfied even after a collection.
    #[display(fmt = "heap exhausted: needed {_0} words after collection")]
    HeapExhausted(u32),

    /// The debug heap checker found a malformed object, stray header,
    /// dangling pointer, or bad record descriptor.
    #[display(fmt = "heap corruption detected: {_0}")]
    HeapCorruption(HeapCorruptionKind),

    /// Arithmetic or literal parsing exceeded the small-integer range.
    #[display(fmt = "fixnum overflow")]
    FixnumOverflow,

    /// The evaluator encountered a form with an unknown opcode, wrong
    /// arity for its op, or an environment reference indexing past the
    /// frame chain.
    #[display(fmt = "malformed form: {_0}")]
    MalformedForm(MalformedFormKind),

    /// `call`/`apply`'s target was not a closure.
    #[display(fmt = "apply target is not a closure")]
    InvalidApply,

    /// A root was unregistered out of LIFO order.
    #[display(fmt = "root stack discipline violated")]
    RootDiscipline,
}

/// Detail describing which heap-checker pass failed, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapCorruptionKind {
    /// A record's descriptor slot does not itself point at a record.
    BadRecordDescriptor,
    /// A value slot holds a pointer whose target lies outside the heap.
    PointerOutOfBounds,
    /// A value slot holds a pointer that does not land on an object start.
    PointerMisaligned,
    /// A value slot holds a header or record-descriptor header directly.
    HeaderInValueSlot,
    /// The scanner walked off the end of the heap mid-object.
    TruncatedObject,
}

impl fmt::Display for HeapCorruptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            HeapCorruptionKind::BadRecordDescriptor => "record descriptor is not a record",
            HeapCorruptionKind::PointerOutOfBounds => "pointer target outside heap bounds",
            HeapCorruptionKind::PointerMisaligned => "pointer does not land on an object start",
            HeapCorruptionKind::HeaderInValueSlot => "header value found in a value slot",
            HeapCorruptionKind::TruncatedObject => "object runs past the end of the heap",
        };
        f.write_str(msg)
    }
}

/// Detail describing why a compiled form was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedFormKind {
    /// The operation vector's first slot is not a recognized opcode.
    UnknownOpcode(i32),
    /// An operation was given the wrong number of arguments.
    WrongArity { expected_at_least: usize, got: usize },
    /// An `(up . n)` environment reference walked past the top of the
    /// environment chain.
    EnvironmentOverrun,
}

impl fmt::Display for MalformedFormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedFormKind::UnknownOpcode(code) => write!(f, "unknown opcode {code}"),
            MalformedFormKind::WrongArity { expected_at_least, got } => {
                write!(f, "wrong arity: expected at least {expected_at_least}, got {got}")
            }
            MalformedFormKind::EnvironmentOverrun => {
                write!(f, "environment reference indexes past the frame chain")
            }
        }
    }
}

impl Error {
    /// True for errors that are fatal (everything but `FixnumOverflow`,
    /// which this implementation still propagates but a front-end may
    /// downgrade).
    pub fn is_fatal(self) -> bool {
        !matches!(self, Error::FixnumOverflow)
    }
}

/// Convenience for producing a [`MalformedFormKind::WrongArity`] error.
pub(crate) fn wrong_arity(expected_at_least: usize, got: usize) -> Error {
    Error::MalformedForm(MalformedFormKind::WrongArity { expected_at_least, got })
}

/// Convenience for producing a [`MalformedFormKind::UnknownOpcode`] error
/// from a raw opcode [`Value`].
pub(crate) fn unknown_opcode(v: Value) -> Error {
    let code = if v.is_fixnum() { v.as_fixnum() } else { -1 };
    Error::MalformedForm(MalformedFormKind::UnknownOpcode(code))
}
