//! Spec §8 invariant 7: host stack usage is independent of a program's
//! call depth. `Evaluator::evaluate` has no recursive call of its own —
//! `eval_form`/`do_op_step`/`use_value` are states of one iterative
//! loop — so the property to demonstrate is that a call chain many
//! times deeper than any real host stack still completes.
//!
//! The op-table (spec §4.7) exposes no comparison or list-destructuring
//! primitive to evaluated forms, so a self-recursive "count down to
//! zero" closure can't be expressed directly. Instead this builds an
//! explicit chain of N distinct closures, each one an unconditional
//! `[call next]` tail call into the next, bottoming out in a closure
//! whose body is the bare literal `0`. Closures are built directly with
//! `rec_make` rather than through `lambda`/`call`, since the textual
//! reader is out of scope and this lets the chain be built without
//! itself recursing on the Rust stack.

mod support;

use minilisp_rt::constructors::rec_make;
use minilisp_rt::eval::Opcode;
use minilisp_rt::prelude::*;
use support::{fx, op_form, test_heap};

const CHAIN_LEN: usize = 100_000;

#[test]
fn a_tail_call_chain_ten_times_deeper_than_the_host_stack_still_completes() {
    let heap = test_heap(CHAIN_LEN * 10 + 8192);
    let builtins = Builtins::bootstrap(&heap).unwrap();
    let evaluator = Evaluator::new(&heap, &builtins);

    let base = rec_make(&heap, builtins.function_type(), &[fx(0), Value::EMPTY_LIST]).unwrap();
    let current = heap.protect(base);

    for _ in 0..CHAIN_LEN - 1 {
        let body = op_form(&heap, Opcode::Call, &[current.get()]);
        let closure = rec_make(&heap, builtins.function_type(), &[body, Value::EMPTY_LIST]).unwrap();
        current.set(closure);
    }

    let form = op_form(&heap, Opcode::Call, &[current.get()]);
    assert_eq!(evaluator.evaluate(&heap, form).unwrap().as_fixnum(), 0);
}
