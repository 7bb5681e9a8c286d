//! The stack-free bootstrap evaluator (spec §4.7).
//!
//! The evaluator's own call stack never grows with user-program nesting:
//! every pending computation lives in a heap-allocated control frame
//! chained through `stack`, and the three conceptual states from the
//! specification (`eval_form`, `do_op_step`, `use_value`) are modeled as
//! an explicit [`State`] the driving loop dispatches on, rather than as
//! host-language recursion. `call`, `apply`, and `if` reuse the current
//! frame instead of pushing a new one before redirecting control, which is
//! what gives self-tail-recursive user programs bounded host-stack use.

use crate::constructors::{car, cdr, cons, rec_desc, rec_make, rec_ref, vec_alloc, vec_len, vec_make, vec_ref, vec_set, Builtins};
use crate::error::{unknown_opcode, wrong_arity, Error, Result};
use crate::heap::{Heap, RootGuard};
use crate::value::Value;

/// The fixed set of operations a compiled form's leading slot may name
/// (spec §6, wire codes are part of the external contract and must not be
/// renumbered).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// `[if cond then else]`.
    If,
    /// `[lambda body]`.
    Lambda,
    /// `[call callee arg...]`.
    Call,
    /// `[apply callee arg-vector]`.
    Apply,
    /// `[quote value]`.
    Quote,
    /// `[set env-ref value]`.
    Set,
    /// `[sum arg...]`.
    Sum,
    /// `[mul arg...]`.
    Mul,
}

impl Opcode {
    /// Maps a wire code to its operation, or `None` if unrecognized.
    pub fn from_code(code: i32) -> Option<Opcode> {
        match code {
            0 => Some(Opcode::If),
            1 => Some(Opcode::Lambda),
            2 => Some(Opcode::Call),
            3 => Some(Opcode::Apply),
            4 => Some(Opcode::Quote),
            5 => Some(Opcode::Set),
            6 => Some(Opcode::Sum),
            7 => Some(Opcode::Mul),
            _ => None,
        }
    }

    /// The wire code for this operation.
    pub fn code(self) -> i32 {
        match self {
            Opcode::If => 0,
            Opcode::Lambda => 1,
            Opcode::Call => 2,
            Opcode::Apply => 3,
            Opcode::Quote => 4,
            Opcode::Set => 5,
            Opcode::Sum => 6,
            Opcode::Mul => 7,
        }
    }
}

/// Checks an operation vector's length against its op's fixed or minimum
/// arity (spec §4.7's table). `form_len` includes the leading op slot.
fn validate_arity(op: Opcode, form_len: usize) -> Result<()> {
    let got = form_len.saturating_sub(1);
    let (expected, exact) = match op {
        Opcode::Quote | Opcode::Lambda => (1, true),
        Opcode::If => (3, true),
        Opcode::Set | Opcode::Apply => (2, true),
        Opcode::Call => (1, false),
        Opcode::Sum | Opcode::Mul => (0, false),
    };
    let ok = if exact { got == expected } else { got >= expected };
    if ok {
        Ok(())
    } else {
        Err(wrong_arity(expected, got))
    }
}

/// The three states the driving loop in [`Evaluator::evaluate`] cycles
/// through, corresponding directly to the `eval_form`/`do_op_step`/
/// `use_value` labels of spec §4.7.
enum State {
    EvalForm,
    DoOpStep,
    UseValue,
}

/// The evaluator's complete live state: the form under evaluation, the
/// environment chain, the control stack, and the operation currently
/// being stepped through. Every value-typed field is a registered root,
/// kept correct across any collection an allocation inside the loop may
/// trigger.
///
/// Field order matters here: Rust drops struct fields top-to-bottom in
/// declaration order, but the root stack is LIFO, so the fields must be
/// declared in the *reverse* of the order [`Evaluator::evaluate`] pushes
/// their guards in (`form` pushed first/bottom … `value` pushed
/// last/top), or dropping `Frame` unregisters them out of order and
/// trips the discipline check in `RootGuard::drop`.
struct Frame<'h> {
    value: RootGuard<'h>,
    top_form: RootGuard<'h>,
    top_result: RootGuard<'h>,
    env: RootGuard<'h>,
    stack: RootGuard<'h>,
    form: RootGuard<'h>,
    top_pos: i32,
    top_op: i32,
}

impl<'h> Frame<'h> {
    /// Saves the current operation onto `stack` and starts stepping
    /// through `form_vec` under `op` (the `PUSH` macro of the reference
    /// evaluator).
    fn push(&mut self, heap: &'h Heap, form_vec: Value, op: Opcode) -> Result<()> {
        let saved = vec_alloc(heap, 3)?;
        let gsaved = heap.protect(saved);
        vec_set(heap, gsaved.get(), 0, self.top_form.get());
        vec_set(heap, gsaved.get(), 1, self.top_result.get());
        vec_set(heap, gsaved.get(), 2, Value::fixnum_unchecked(self.top_pos));
        let new_stack = cons(heap, gsaved.get(), self.stack.get())?;
        self.stack.set(new_stack);

        let len = vec_len(heap, form_vec);
        let new_result = vec_make(heap, len, Value::UNSPECIFIED)?;
        self.top_form.set(form_vec);
        self.top_result.set(new_result);
        self.top_op = op.code();
        self.top_pos = 1;
        Ok(())
    }

    /// Restores the operation atop `stack` (the `POP` macro of the
    /// reference evaluator). Never allocates.
    fn pop(&mut self, heap: &Heap) {
        let saved = car(heap, self.stack.get());
        let restored_top_form = vec_ref(heap, saved, 0);
        self.top_result.set(vec_ref(heap, saved, 1));
        self.top_pos = vec_ref(heap, saved, 2).as_fixnum();
        self.top_op = vec_ref(heap, restored_top_form, 0).as_fixnum();
        self.top_form.set(restored_top_form);
        self.stack.set(cdr(heap, self.stack.get()));
    }
}

/// Folds `sum`/`mul` over the argument slots of `vals` (slots `1..len`,
/// slot 0 being the unused op marker the results vector shares with its
/// originating form), signalling [`Error::FixnumOverflow`] on overflow
/// rather than wrapping (spec §4.1: "user-visible arithmetic must detect
/// overflow").
fn fold_arith(heap: &Heap, vals: Value, identity: i32, op: impl Fn(i32, i32) -> Option<i32>) -> Result<Value> {
    let mut acc = identity;
    for i in 1..vec_len(heap, vals) {
        let arg = vec_ref(heap, vals, i).as_fixnum();
        acc = op(acc, arg).ok_or(Error::FixnumOverflow)?;
    }
    Value::fixnum(acc).ok_or(Error::FixnumOverflow)
}

/// A stack-free interpreter for the compiled-form language of spec §4.7.
///
/// `Evaluator` is cheap to construct and holds only a root over the
/// `function` record type it needs to build and recognize closures;
/// [`Evaluator::evaluate`] may be called repeatedly, across collections,
/// against the heap it was built from.
pub struct Evaluator<'h> {
    function_type: RootGuard<'h>,
}

impl<'h> Evaluator<'h> {
    /// Builds an evaluator that constructs closures of `builtins`'s
    /// `function` record type.
    pub fn new(heap: &'h Heap, builtins: &Builtins<'h>) -> Evaluator<'h> {
        Evaluator {
            function_type: heap.protect(builtins.function_type()),
        }
    }

    /// Evaluates a single compiled form to completion, returning its
    /// value. Host stack use is O(1) regardless of the nesting or
    /// recursion depth of `form` (spec §8 invariant 7); all pending work
    /// lives on `heap` via [`Frame::stack`].
    pub fn evaluate(&self, heap: &'h Heap, form: Value) -> Result<Value> {
        let form_root = heap.protect(form);
        let stack_root = heap.protect(Value::EMPTY_LIST);
        let env_root = heap.protect(Value::EMPTY_LIST);
        let top_result_root = heap.protect(Value::EMPTY_LIST);
        let sentinel = vec_make(heap, 1, Value::fixnum_unchecked(Opcode::Sum.code()))?;
        let top_form_root = heap.protect(sentinel);
        let value_root = heap.protect(Value::UNSPECIFIED);

        let mut st = Frame {
            form: form_root,
            stack: stack_root,
            env: env_root,
            top_form: top_form_root,
            top_result: top_result_root,
            value: value_root,
            top_pos: 1,
            top_op: Opcode::Sum.code(),
        };

        let mut state = State::EvalForm;
        loop {
            state = match state {
                State::EvalForm => self.step_eval_form(heap, &mut st)?,
                State::DoOpStep => self.step_do_op(heap, &mut st)?,
                State::UseValue => {
                    if st.top_result.get().is_empty_list() {
                        return Ok(st.value.get());
                    }
                    vec_set(heap, st.top_result.get(), st.top_pos as usize, st.value.get());
                    st.top_pos += 1;
                    State::DoOpStep
                }
            };
        }
    }

    fn check_closure(&self, heap: &Heap, func: Value) -> Result<()> {
        if func.is_record() && rec_desc(heap, func) == self.function_type.get() {
            Ok(())
        } else {
            Err(Error::InvalidApply)
        }
    }

    /// `eval_form`: dispatches on the shape of the current form.
    fn step_eval_form(&self, heap: &'h Heap, st: &mut Frame<'h>) -> Result<State> {
        let f = st.form.get();

        if f.is_pair() {
            let up = car(heap, f).as_fixnum();
            let n = cdr(heap, f).as_fixnum();
            if up < 0 || n < 0 {
                return Err(Error::MalformedForm(crate::error::MalformedFormKind::EnvironmentOverrun));
            }
            let mut env_frame = st.env.get();
            for _ in 0..up {
                if !env_frame.is_pair() {
                    return Err(Error::MalformedForm(crate::error::MalformedFormKind::EnvironmentOverrun));
                }
                env_frame = cdr(heap, env_frame);
            }
            if !env_frame.is_pair() {
                return Err(Error::MalformedForm(crate::error::MalformedFormKind::EnvironmentOverrun));
            }
            let head = car(heap, env_frame);
            let idx = n as usize + 2;
            if !head.is_vector() || idx >= vec_len(heap, head) {
                return Err(Error::MalformedForm(crate::error::MalformedFormKind::EnvironmentOverrun));
            }
            st.value.set(vec_ref(heap, head, idx));
            Ok(State::UseValue)
        } else if f.is_vector() {
            let op_word = vec_ref(heap, f, 0);
            if !op_word.is_fixnum() {
                return Err(unknown_opcode(op_word));
            }
            let op = Opcode::from_code(op_word.as_fixnum()).ok_or_else(|| unknown_opcode(op_word))?;
            validate_arity(op, vec_len(heap, f))?;

            match op {
                Opcode::Quote => {
                    st.value.set(vec_ref(heap, f, 1));
                    Ok(State::UseValue)
                }
                Opcode::Lambda => {
                    let body = vec_ref(heap, f, 1);
                    let closure = rec_make(heap, self.function_type.get(), &[body, st.env.get()])?;
                    st.value.set(closure);
                    Ok(State::UseValue)
                }
                _ => {
                    st.push(heap, f, op)?;
                    Ok(State::DoOpStep)
                }
            }
        } else {
            st.value.set(f);
            Ok(State::UseValue)
        }
    }

    /// `do_op_step`: applies the current operation once all of its
    /// subforms have been stepped through, or advances to the next one.
    fn step_do_op(&self, heap: &'h Heap, st: &mut Frame<'h>) -> Result<State> {
        let op = Opcode::from_code(st.top_op).expect("top_op always holds a value installed by push()");

        match op {
            Opcode::If => {
                if st.top_pos == 1 {
                    let cond_form = vec_ref(heap, st.top_form.get(), 1);
                    st.form.set(cond_form);
                } else {
                    let branch = if vec_ref(heap, st.top_result.get(), 1).is_truthy() { 2 } else { 3 };
                    let next_form = vec_ref(heap, st.top_form.get(), branch);
                    st.pop(heap);
                    st.form.set(next_form);
                }
                Ok(State::EvalForm)
            }

            Opcode::Set => {
                if st.top_pos == 1 {
                    st.top_pos = 2;
                    let value_form = vec_ref(heap, st.top_form.get(), 2);
                    st.form.set(value_form);
                    Ok(State::EvalForm)
                } else {
                    let env_ref = vec_ref(heap, st.top_form.get(), 1);
                    if !env_ref.is_pair() {
                        return Err(Error::MalformedForm(crate::error::MalformedFormKind::EnvironmentOverrun));
                    }
                    let up = car(heap, env_ref).as_fixnum();
                    let n = cdr(heap, env_ref).as_fixnum();
                    if up < 0 || n < 0 {
                        return Err(Error::MalformedForm(crate::error::MalformedFormKind::EnvironmentOverrun));
                    }
                    let mut env_frame = st.env.get();
                    for _ in 0..up {
                        if !env_frame.is_pair() {
                            return Err(Error::MalformedForm(crate::error::MalformedFormKind::EnvironmentOverrun));
                        }
                        env_frame = cdr(heap, env_frame);
                    }
                    if !env_frame.is_pair() {
                        return Err(Error::MalformedForm(crate::error::MalformedFormKind::EnvironmentOverrun));
                    }
                    let head = car(heap, env_frame);
                    let idx = n as usize + 2;
                    if !head.is_vector() || idx >= vec_len(heap, head) {
                        return Err(Error::MalformedForm(crate::error::MalformedFormKind::EnvironmentOverrun));
                    }
                    let v = st.value.get();
                    vec_set(heap, head, idx, v);
                    st.pop(heap);
                    st.value.set(v);
                    Ok(State::UseValue)
                }
            }

            _ if (st.top_pos as usize) < vec_len(heap, st.top_form.get()) => {
                let next_form = vec_ref(heap, st.top_form.get(), st.top_pos as usize);
                st.form.set(next_form);
                Ok(State::EvalForm)
            }

            Opcode::Call => {
                let func = vec_ref(heap, st.top_result.get(), 1);
                self.check_closure(heap, func)?;
                let body = rec_ref(heap, func, 0);
                let new_env = cons(heap, st.top_result.get(), rec_ref(heap, func, 1))?;
                st.env.set(new_env);
                st.pop(heap);
                st.form.set(body);
                Ok(State::EvalForm)
            }

            Opcode::Apply => {
                let func = vec_ref(heap, st.top_result.get(), 1);
                self.check_closure(heap, func)?;
                let args = vec_ref(heap, st.top_result.get(), 2);
                if !args.is_vector() {
                    return Err(Error::InvalidApply);
                }
                let body = rec_ref(heap, func, 0);
                let captured_env = rec_ref(heap, func, 1);

                let gargs = heap.protect(args);
                let gbody = heap.protect(body);
                let gcaptured = heap.protect(captured_env);
                let l = vec_len(heap, gargs.get());
                let frame_vec = vec_alloc(heap, l + 2)?;
                let gframe = heap.protect(frame_vec);
                for i in 0..l {
                    let a = vec_ref(heap, gargs.get(), i);
                    vec_set(heap, gframe.get(), i + 2, a);
                }
                let new_env = cons(heap, gframe.get(), gcaptured.get())?;

                st.env.set(new_env);
                st.pop(heap);
                st.form.set(gbody.get());
                Ok(State::EvalForm)
            }

            Opcode::Sum => {
                let v = fold_arith(heap, st.top_result.get(), 0, i32::checked_add)?;
                st.pop(heap);
                st.value.set(v);
                Ok(State::UseValue)
            }

            Opcode::Mul => {
                let v = fold_arith(heap, st.top_result.get(), 1, i32::checked_mul)?;
                st.pop(heap);
                st.value.set(v);
                Ok(State::UseValue)
            }

            Opcode::Quote | Opcode::Lambda | Opcode::If | Opcode::Set => {
                unreachable!("handled above or never pushed")
            }
        }
    }
}
