//! The collector proper: `copy` and `scan` (spec §4.5).
//!
//! Neither function recurses into the other — `scan` calls `copy`, never
//! the reverse — which is what keeps a collection's host-stack use
//! bounded regardless of heap shape (spec §4.5 "Termination argument",
//! §8 invariant 5).

use super::object;
use super::round_up_even;
use crate::error::{Error, HeapCorruptionKind, Result};
use crate::value::{header, Value};

/// If `v` is a pointer, relocates its referent into the destination
/// semispace (bump-allocating from `new_next`), leaving a forwarding
/// marker behind, and returns the re-tagged pointer to the new location.
/// Non-pointers are returned unchanged. Repeated calls for the same
/// old-space object return the same new location, short-circuiting
/// through the forwarding marker (spec §8 invariant 4).
pub(crate) fn copy(
    storage: &mut [u32],
    v: Value,
    new_base: u32,
    new_end: u32,
    new_next: &mut usize,
) -> Value {
    if !v.is_pointer() {
        return v;
    }

    let p = v.pointer_word_index() as usize;
    let tag = v.pointer_tag();

    if let Some(target) = Value::forwarding_target(storage[p], new_base, new_end) {
        return Value::retag_pointer(tag, target);
    }

    let size = object::size_at(storage, p, v, new_base, new_end);
    let new_p = *new_next;
    *new_next += round_up_even(size);

    storage.copy_within(p..p + size, new_p);
    storage[p] = Value::forwarding_marker(new_p as u32).to_raw();

    Value::retag_pointer(tag, new_p as u32)
}

/// Walks the single object starting at (already-copied, destination
/// semispace) word index `p`, rewriting every outgoing reference through
/// [`copy`]. Returns the word index of the next object, rounded up to an
/// 8-byte boundary.
pub(crate) fn scan(
    storage: &mut [u32],
    p: usize,
    new_base: u32,
    new_end: u32,
    new_next: &mut usize,
) -> Result<usize> {
    let first_word = storage[p];

    let (value_start, value_count, size) = if header::is_record_desc_header(first_word) {
        let desc_word_index = header::record_desc_header_address(first_word);
        let desc_value = Value::record_at(desc_word_index);
        let new_desc = copy(storage, desc_value, new_base, new_end, new_next);
        let new_desc_index = new_desc.pointer_word_index();
        storage[p] = header::make_record_desc_header(new_desc_index);

        let s = Value::from_raw(storage[new_desc_index as usize + 1]).as_fixnum();
        if s >= 0 {
            (p + 1, s as usize, s as usize + 1)
        } else {
            (p + 1, 0, s.unsigned_abs() as usize + 1)
        }
    } else if header::is_vector_header(first_word) {
        let len = header::vector_header_len(first_word) as usize;
        (p + 1, len, len + 1)
    } else if header::is_bytev_header(first_word) {
        let byte_len = header::bytev_header_len(first_word) as usize;
        let payload = object::payload_words(byte_len);
        (p + 1 + payload, 0, 1 + payload)
    } else if header::is_code_header(first_word) {
        let byte_len = header::bytev_header_len(first_word) as usize;
        let payload = object::payload_words(byte_len);
        let lit_count = storage[p + 1 + payload] as usize;
        (p + 2 + payload, lit_count, 2 + payload + lit_count)
    } else if header::is_pair_first_word(first_word) {
        (p, 2, 2)
    } else {
        return Err(Error::HeapCorruption(HeapCorruptionKind::HeaderInValueSlot));
    };

    for i in 0..value_count {
        let idx = value_start + i;
        let v = Value::from_raw(storage[idx]);
        let copied = copy(storage, v, new_base, new_end, new_next);
        storage[idx] = copied.to_raw();
    }

    Ok(round_up_even(p + size))
}
