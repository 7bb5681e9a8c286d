//! The two-pass heap consistency checker (spec §4.6), run before and
//! after every collection when [`super::HeapConfig::check_on_collect`] is
//! set.

use super::object;
use super::round_up_even;
use super::Heap;
use crate::error::{Error, HeapCorruptionKind, Result};
use crate::value::{header, Value};
use alloc::vec;
use alloc::vec::Vec;

fn corrupt(kind: HeapCorruptionKind) -> Error {
    tracing::error!(?kind, "heap corruption detected");
    Error::HeapCorruption(kind)
}

/// Classifies the object whose first word is `first_word`, returning its
/// total size in words. For a record, also verifies that its descriptor
/// is itself a record (spec §4.6 pass 1).
fn object_size(storage: &[u32], p: usize) -> Result<usize> {
    let first_word = storage[p];

    if header::is_record_desc_header(first_word) {
        let desc_index = header::record_desc_header_address(first_word) as usize;
        if desc_index >= storage.len() || !header::is_record_desc_header(storage[desc_index]) {
            return Err(corrupt(HeapCorruptionKind::BadRecordDescriptor));
        }
        let s = Value::from_raw(storage[desc_index + 1]).as_fixnum();
        Ok(s.unsigned_abs() as usize + 1)
    } else if header::is_vector_header(first_word) {
        Ok(header::vector_header_len(first_word) as usize + 1)
    } else if header::is_bytev_header(first_word) {
        let byte_len = header::bytev_header_len(first_word) as usize;
        Ok(1 + object::payload_words(byte_len))
    } else if header::is_code_header(first_word) {
        let byte_len = header::bytev_header_len(first_word) as usize;
        let payload = object::payload_words(byte_len);
        let lit_count = storage[p + 1 + payload] as usize;
        Ok(2 + payload + lit_count)
    } else if header::is_pair_first_word(first_word) {
        Ok(2)
    } else {
        Err(corrupt(HeapCorruptionKind::HeaderInValueSlot))
    }
}

/// The range of value slots (start index, count) that must be scanned
/// for outgoing references, for the object at `p` whose size is `size`.
fn value_slots(storage: &[u32], p: usize, size: usize) -> (usize, usize) {
    let first_word = storage[p];

    if header::is_record_desc_header(first_word) {
        let desc_index = header::record_desc_header_address(first_word) as usize;
        let s = Value::from_raw(storage[desc_index + 1]).as_fixnum();
        if s >= 0 {
            (p + 1, s as usize)
        } else {
            (p + 1, 0)
        }
    } else if header::is_vector_header(first_word) {
        (p + 1, size - 1)
    } else if header::is_bytev_header(first_word) {
        (p + size, 0)
    } else if header::is_code_header(first_word) {
        let byte_len = header::bytev_header_len(first_word) as usize;
        let payload = object::payload_words(byte_len);
        (p + 2 + payload, size - 2 - payload)
    } else {
        // pair
        (p, 2)
    }
}

/// Runs both checker passes over `heap`'s active semispace.
pub(crate) fn check(heap: &Heap) -> Result<()> {
    let storage = heap.storage.borrow();
    let base = heap.active_base.get();
    let next = heap.next.get();
    let end = base + heap.capacity;

    let mut shadow: Vec<usize> = vec![0; heap.capacity];

    let mut ptr = base;
    while ptr < next {
        let size = object_size(&storage, ptr)?;
        shadow[ptr - base] = size;
        ptr = round_up_even(ptr + size);
    }

    let mut ptr = base;
    while ptr < next {
        let size = shadow[ptr - base];
        if size == 0 {
            return Err(corrupt(HeapCorruptionKind::TruncatedObject));
        }
        let (start, count) = value_slots(&storage, ptr, size);

        for i in 0..count {
            let word = storage[start + i];
            if header::is_record_desc_header(word)
                || header::is_vector_header(word)
                || header::is_bytev_header(word)
                || header::is_code_header(word)
            {
                return Err(corrupt(HeapCorruptionKind::HeaderInValueSlot));
            }
            let v = Value::from_raw(word);
            if v.is_pointer() {
                let target = v.pointer_word_index() as usize;
                if target < base || target >= end {
                    return Err(corrupt(HeapCorruptionKind::PointerOutOfBounds));
                }
                if shadow[target - base] == 0 {
                    return Err(corrupt(HeapCorruptionKind::PointerMisaligned));
                }
            }
        }

        ptr = round_up_even(ptr + size);
    }

    Ok(())
}
