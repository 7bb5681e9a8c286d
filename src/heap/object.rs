//! Object-shape arithmetic (spec §3, §4.4): computing sizes and value-slot
//! ranges purely from a heap address and the bytes found there, with no
//! side table.

use crate::value::{header, Value};

/// Number of whole words needed to hold `byte_len` bytes.
pub(crate) fn payload_words(byte_len: usize) -> usize {
    (byte_len + 3) / 4
}

/// Total size in words (including the header, for every kind but pairs,
/// which have none) of the pointer-tagged object `v` found at word index
/// `p`. Does not copy or mutate anything.
///
/// For a record, the descriptor's field 0 gives the size; if the
/// descriptor has already been forwarded to `[new_base, new_end)` by this
/// collection, the forwarded copy is read instead of the stale original
/// — but the descriptor itself is not copied here (spec §4.5: "possibly
/// dereferencing a forwarding pointer in the descriptor").
pub(crate) fn size_at(storage: &[u32], p: usize, v: Value, new_base: u32, new_end: u32) -> usize {
    if v.is_pair() {
        2
    } else if v.is_vector() {
        header::vector_header_len(storage[p]) as usize + 1
    } else if v.is_record() {
        let desc_word_index = header::record_desc_header_address(storage[p]);
        let resolved =
            Value::forwarding_target(storage[desc_word_index as usize], new_base, new_end)
                .unwrap_or(desc_word_index);
        let s = Value::from_raw(storage[resolved as usize + 1]).as_fixnum();
        s.unsigned_abs() as usize + 1
    } else {
        debug_assert!(v.is_bytev_or_code());
        let header_word = storage[p];
        let byte_len = header::bytev_header_len(header_word) as usize;
        if header::is_code_header(header_word) {
            let payload = payload_words(byte_len);
            let lit_count = storage[p + 1 + payload] as usize;
            2 + payload + lit_count
        } else {
            1 + payload_words(byte_len)
        }
    }
}
