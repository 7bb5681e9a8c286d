//! Shared helpers for hand-building compiled forms (spec §4.7's wire
//! contract), since the textual reader that would normally produce them
//! is out of scope for this crate.

use minilisp_rt::constructors::{cons, vec_make, vec_set};
use minilisp_rt::eval::Opcode;
use minilisp_rt::prelude::*;

/// A heap sized generously for these tests, with the debug checker on by
/// default so any corruption a test introduces surfaces immediately
/// rather than as a confusing downstream assertion failure.
pub fn test_heap(capacity_words: usize) -> Heap {
    Heap::new(HeapConfig {
        capacity_words,
        collect_every_allocation: false,
        check_on_collect: true,
    })
}

/// Builds the operation vector `[op arg1 arg2 ...]`.
pub fn op_form(heap: &Heap, op: Opcode, args: &[Value]) -> Value {
    let v = vec_make(heap, args.len() + 1, Value::UNSPECIFIED).expect("room for a small form");
    vec_set(heap, v, 0, Value::fixnum(op.code()).expect("opcodes fit a fixnum"));
    for (i, a) in args.iter().enumerate() {
        vec_set(heap, v, i + 1, *a);
    }
    v
}

/// Builds the compiled literal `[quote value]`.
pub fn quote_form(heap: &Heap, value: Value) -> Value {
    op_form(heap, Opcode::Quote, &[value])
}

/// Builds an environment reference `(up . n)`.
pub fn env_ref(heap: &Heap, up: i32, n: i32) -> Value {
    cons(heap, fx(up), fx(n)).expect("room for an env-ref pair")
}

/// A fixnum literal (test-only; panics if `n` is out of range).
pub fn fx(n: i32) -> Value {
    Value::fixnum(n).expect("test fixnum literal in range")
}
