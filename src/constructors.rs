//! Object constructors and accessors (spec §4.3), and the bootstrap
//! [`Builtins`] that seeds the heap's root set with the four built-in
//! record-type descriptors, the symbol table, and the dot-token sentinel.
//!
//! Every constructor that holds a live value across a potential
//! allocation site registers that value as a root first, following the
//! discipline of spec §4.3: "no value-typed local that outlives an
//! allocation site may be read after that site unless it was a
//! registered root during the allocation."

use crate::consts::SYMBOL_TABLE_BUCKETS;
use crate::error::Result;
use crate::heap::{object, Heap, RootGuard};
use crate::value::{header, Value};
use alloc::vec::Vec;

// -- pairs ------------------------------------------------------------

/// Allocates an uninitialized pair. Callers must fill both slots before
/// exposing the result (fresh heap memory reads as `0`, which coincides
/// with fixnum zero — harmless, but not meaningful data).
pub fn pair_alloc(heap: &Heap) -> Result<Value> {
    let idx = heap.allocate(2)?;
    Ok(Value::pair_at(idx as u32))
}

/// The first slot of a pair.
pub fn car(heap: &Heap, v: Value) -> Value {
    debug_assert!(v.is_pair(), "car of non-pair");
    Value::from_raw(heap.word_at(v.pointer_word_index() as usize))
}

/// The second slot of a pair.
pub fn cdr(heap: &Heap, v: Value) -> Value {
    debug_assert!(v.is_pair(), "cdr of non-pair");
    Value::from_raw(heap.word_at(v.pointer_word_index() as usize + 1))
}

/// Overwrites a pair's first slot.
pub fn set_car(heap: &Heap, v: Value, x: Value) {
    debug_assert!(v.is_pair(), "set_car of non-pair");
    heap.set_word_at(v.pointer_word_index() as usize, x.to_raw());
}

/// Overwrites a pair's second slot.
pub fn set_cdr(heap: &Heap, v: Value, x: Value) {
    debug_assert!(v.is_pair(), "set_cdr of non-pair");
    heap.set_word_at(v.pointer_word_index() as usize + 1, x.to_raw());
}

/// Allocates a pair holding `(a . d)`.
pub fn cons(heap: &Heap, a: Value, d: Value) -> Result<Value> {
    let ga = heap.protect(a);
    let gd = heap.protect(d);
    let v = pair_alloc(heap)?;
    set_car(heap, v, ga.get());
    set_cdr(heap, v, gd.get());
    Ok(v)
}

// -- vectors ------------------------------------------------------------

/// Allocates a vector of `len` slots, header written, contents
/// uninitialized (callers must fill).
pub fn vec_alloc(heap: &Heap, len: usize) -> Result<Value> {
    let idx = heap.allocate(len + 1)?;
    heap.set_word_at(idx, header::make_vector_header(len as u32));
    Ok(Value::vector_at(idx as u32))
}

/// Number of slots in a vector.
pub fn vec_len(heap: &Heap, v: Value) -> usize {
    debug_assert!(v.is_vector(), "vec_len of non-vector");
    header::vector_header_len(heap.word_at(v.pointer_word_index() as usize)) as usize
}

/// The `i`th slot of a vector.
pub fn vec_ref(heap: &Heap, v: Value, i: usize) -> Value {
    debug_assert!(v.is_vector(), "vec_ref of non-vector");
    Value::from_raw(heap.word_at(v.pointer_word_index() as usize + 1 + i))
}

/// Overwrites the `i`th slot of a vector.
pub fn vec_set(heap: &Heap, v: Value, i: usize, x: Value) {
    debug_assert!(v.is_vector(), "vec_set of non-vector");
    heap.set_word_at(v.pointer_word_index() as usize + 1 + i, x.to_raw());
}

/// Allocates a vector of `len` slots, every slot initialized to `init`.
pub fn vec_make(heap: &Heap, len: usize, init: Value) -> Result<Value> {
    let ginit = heap.protect(init);
    let v = vec_alloc(heap, len)?;
    for i in 0..len {
        vec_set(heap, v, i, ginit.get());
    }
    Ok(v)
}

// -- byte-vectors ------------------------------------------------------------

/// Allocates a byte-vector of `len` bytes, header written, contents
/// uninitialized.
pub fn bytev_alloc(heap: &Heap, len: usize) -> Result<Value> {
    let idx = heap.allocate(object::payload_words(len) + 1)?;
    heap.set_word_at(idx, header::make_bytev_header(len as u32));
    Ok(Value::bytev_or_code_at(idx as u32))
}

/// Length in bytes of a byte-vector.
pub fn bytev_len(heap: &Heap, v: Value) -> usize {
    debug_assert!(v.is_bytev_or_code(), "bytev_len of non-bytev");
    header::bytev_header_len(heap.word_at(v.pointer_word_index() as usize)) as usize
}

/// The `i`th byte of a byte-vector.
pub fn bytev_ref_u8(heap: &Heap, v: Value, i: usize) -> u8 {
    let base = v.pointer_word_index() as usize;
    let word = heap.word_at(base + 1 + i / 4);
    (word >> ((i % 4) * 8)) as u8
}

/// Overwrites the `i`th byte of a byte-vector.
pub fn bytev_set_u8(heap: &Heap, v: Value, i: usize, byte: u8) {
    let base = v.pointer_word_index() as usize;
    let word_idx = base + 1 + i / 4;
    let shift = (i % 4) * 8;
    let mut word = heap.word_at(word_idx);
    word &= !(0xFFu32 << shift);
    word |= (byte as u32) << shift;
    heap.set_word_at(word_idx, word);
}

// -- records ------------------------------------------------------------

/// Allocates a record of `len` fields. Caller must set the descriptor
/// before the record is otherwise touched (spec §4.3).
pub fn rec_alloc(heap: &Heap, len: usize) -> Result<Value> {
    let idx = heap.allocate(len + 1)?;
    Ok(Value::record_at(idx as u32))
}

/// Sets a record's descriptor.
pub fn rec_set_desc(heap: &Heap, v: Value, desc: Value) {
    debug_assert!(v.is_record() && desc.is_record(), "rec_set_desc on non-record");
    let idx = v.pointer_word_index() as usize;
    heap.set_word_at(idx, header::make_record_desc_header(desc.pointer_word_index()));
}

/// A record's descriptor.
pub fn rec_desc(heap: &Heap, v: Value) -> Value {
    debug_assert!(v.is_record(), "rec_desc of non-record");
    let header_word = heap.word_at(v.pointer_word_index() as usize);
    Value::record_at(header::record_desc_header_address(header_word))
}

/// The `i`th field of a record.
pub fn rec_ref(heap: &Heap, v: Value, i: usize) -> Value {
    debug_assert!(v.is_record(), "rec_ref of non-record");
    Value::from_raw(heap.word_at(v.pointer_word_index() as usize + 1 + i))
}

/// Overwrites the `i`th field of a record. Returns nothing (spec §9:
/// `rec_set` never produced a return value in the source despite
/// declaring one; this is implemented as the void operation it always
/// behaved as).
pub fn rec_set(heap: &Heap, v: Value, i: usize, x: Value) {
    debug_assert!(v.is_record(), "rec_set of non-record");
    heap.set_word_at(v.pointer_word_index() as usize + 1 + i, x.to_raw());
}

/// The field count declared by a record's descriptor (field 0 of the
/// descriptor; negative for a raw/unscannable record).
pub fn rec_len(heap: &Heap, v: Value) -> i32 {
    let desc = rec_desc(heap, v);
    rec_ref(heap, desc, 0).as_fixnum()
}

/// Allocates a record of `type_`'s shape, with `fields` as its contents.
pub fn rec_make(heap: &Heap, type_: Value, fields: &[Value]) -> Result<Value> {
    let gtype = heap.protect(type_);
    let mut field_guards: Vec<RootGuard> = Vec::with_capacity(fields.len());
    for f in fields {
        field_guards.push(heap.protect(*f));
    }

    let v = rec_alloc(heap, field_guards.len())?;
    rec_set_desc(heap, v, gtype.get());
    for (i, g) in field_guards.iter().enumerate() {
        rec_set(heap, v, i, g.get());
    }

    // `field_guards` was pushed onto the root stack in forward order, so
    // it must be released in reverse order to honor the LIFO discipline
    // `RootGuard::drop` enforces — `Vec`'s own drop order is front to
    // back, the wrong direction, so we reverse first.
    field_guards.reverse();
    Ok(v)
}

// -- strings and symbols ------------------------------------------------------------

/// Allocates a string record (a one-field record wrapping a fresh
/// byte-vector copy of `bytes`).
pub fn string_make(heap: &Heap, string_type: Value, bytes: &[u8]) -> Result<Value> {
    let b = bytev_alloc(heap, bytes.len())?;
    let gb = heap.protect(b);
    for (i, byte) in bytes.iter().enumerate() {
        bytev_set_u8(heap, gb.get(), i, *byte);
    }
    rec_make(heap, string_type, &[gb.get()])
}

/// True if the string record `string_rec` holds exactly `bytes`.
pub fn string_eq(heap: &Heap, string_rec: Value, bytes: &[u8]) -> bool {
    let bv = rec_ref(heap, string_rec, 0);
    let len = bytev_len(heap, bv);
    len == bytes.len() && (0..len).all(|i| bytev_ref_u8(heap, bv, i) == bytes[i])
}

/// A symbol's name, as a string record.
pub fn symbol_name(heap: &Heap, sym: Value) -> Value {
    rec_ref(heap, sym, 0)
}

fn hash_bytes(bytes: &[u8]) -> usize {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash as usize
}

/// Interns `bytes`, returning the unique symbol with that name — an
/// existing symbol if one was already interned with the same bytes, a
/// freshly allocated one otherwise.
///
/// This performs genuine hash-consing through `builtins.symbols()`'s 511
/// buckets, each a chain of pairs: a name seen before returns the same
/// symbol rather than a fresh, non-`eq` one (see DESIGN.md).
pub fn intern(heap: &Heap, builtins: &Builtins, bytes: &[u8]) -> Result<Value> {
    let bucket_index = hash_bytes(bytes) % SYMBOL_TABLE_BUCKETS;
    let symbols = builtins.symbols();

    let mut cursor = vec_ref(heap, symbols, bucket_index);
    while cursor.is_pair() {
        let sym = car(heap, cursor);
        if string_eq(heap, symbol_name(heap, sym), bytes) {
            return Ok(sym);
        }
        cursor = cdr(heap, cursor);
    }

    let name = string_make(heap, builtins.string_type(), bytes)?;
    let gname = heap.protect(name);
    let sym = rec_make(heap, builtins.symbol_type(), &[gname.get()])?;
    let gsym = heap.protect(sym);

    let old_bucket = vec_ref(heap, symbols, bucket_index);
    let gold_bucket = heap.protect(old_bucket);
    let new_bucket = cons(heap, gsym.get(), gold_bucket.get())?;
    vec_set(heap, symbols, bucket_index, new_bucket);

    Ok(gsym.get())
}

// -- bootstrap ------------------------------------------------------------

/// The small set of well-known roots a bootstrap heap needs before any
/// user program can run: the four built-in record-type descriptors, the
/// symbol-intern table, and a sentinel "dot" token (spec §3 "Root set").
///
/// Field order matters here: Rust drops struct fields top-to-bottom in
/// declaration order, but the root stack is LIFO, so the fields must be
/// declared in the *reverse* of the order [`Builtins::bootstrap`] pushes
/// their guards in (`record_type` pushed first/bottom … `dot_token`
/// pushed last/top), or dropping `Builtins` unregisters them out of
/// order and trips the discipline check in `RootGuard::drop`.
pub struct Builtins<'h> {
    dot_token: RootGuard<'h>,
    symbols: RootGuard<'h>,
    function_type: RootGuard<'h>,
    symbol_type: RootGuard<'h>,
    string_type: RootGuard<'h>,
    record_type: RootGuard<'h>,
}

impl<'h> Builtins<'h> {
    /// Bootstraps the built-in record types and returns the roots
    /// holding them alive.
    ///
    /// The `record-type` descriptor is self-describing: it is allocated,
    /// then patched to be its own descriptor (a one-cycle). This is stable
    /// under collection because the collector recognizes already-forwarded
    /// objects by address, not by following the cycle recursively.
    pub fn bootstrap(heap: &'h Heap) -> Result<Self> {
        let record_type_v = rec_alloc(heap, 2)?;
        rec_set_desc(heap, record_type_v, record_type_v);
        rec_set(heap, record_type_v, 0, Value::fixnum_unchecked(2));
        rec_set(heap, record_type_v, 1, Value::EMPTY_LIST);
        let record_type = heap.protect(record_type_v);

        let string_type_v = rec_make(
            heap,
            record_type.get(),
            &[Value::fixnum_unchecked(1), Value::EMPTY_LIST],
        )?;
        let string_type = heap.protect(string_type_v);

        let symbol_type_v = rec_make(
            heap,
            record_type.get(),
            &[Value::fixnum_unchecked(1), Value::EMPTY_LIST],
        )?;
        let symbol_type = heap.protect(symbol_type_v);

        let function_type_v = rec_make(
            heap,
            record_type.get(),
            &[Value::fixnum_unchecked(2), Value::EMPTY_LIST],
        )?;
        let function_type = heap.protect(function_type_v);

        let symbols_v = vec_make(heap, SYMBOL_TABLE_BUCKETS, Value::EMPTY_LIST)?;
        let symbols = heap.protect(symbols_v);

        let dot_token_v = string_make(heap, string_type.get(), b"{dot token}")?;
        let dot_token = heap.protect(dot_token_v);

        Ok(Builtins {
            record_type,
            string_type,
            symbol_type,
            function_type,
            symbols,
            dot_token,
        })
    }

    /// The self-describing type-of-types descriptor.
    pub fn record_type(&self) -> Value {
        self.record_type.get()
    }
    /// The `string` record type.
    pub fn string_type(&self) -> Value {
        self.string_type.get()
    }
    /// The `symbol` record type.
    pub fn symbol_type(&self) -> Value {
        self.symbol_type.get()
    }
    /// The `function` (closure) record type.
    pub fn function_type(&self) -> Value {
        self.function_type.get()
    }
    /// The symbol-intern table, a vector of 511 buckets.
    pub fn symbols(&self) -> Value {
        self.symbols.get()
    }
    /// The sentinel dot token, a string record used by a front-end reader
    /// to mark a literal `.` token (out of scope for this core, kept here
    /// only as a root a reader can retrieve).
    pub fn dot_token(&self) -> Value {
        self.dot_token.get()
    }
}
