//! Tunable parameters of the runtime.

/// Word size in bytes for the 32-bit variant this crate implements.
pub const WORD_SIZE: usize = core::mem::size_of::<u32>();

/// Default capacity of a single semispace, in words. This is the reference
/// configuration; embedders may choose any capacity via
/// [`crate::heap::HeapConfig`].
pub const DEFAULT_HEAP_WORDS: usize = 217_000;

/// Lower bound (inclusive) of the small-integer range.
pub const FIXNUM_MIN: i32 = -(1 << 29);

/// Upper bound (inclusive) of the small-integer range.
pub const FIXNUM_MAX: i32 = (1 << 29) - 1;

/// Upper bound (inclusive) of a character code point. Valid Unicode tops out
/// at `0x10FFFF`; the mask this crate uses accommodates exactly that, not
/// the 26 bits the bit layout would otherwise permit (see spec Open
/// Questions).
pub const CHAR_MAX: u32 = 0x0010_FFFF;

/// Number of buckets in the symbol-intern table.
pub const SYMBOL_TABLE_BUCKETS: usize = 511;

static_assertions::const_assert!(FIXNUM_MIN < FIXNUM_MAX);
static_assertions::const_assert!(CHAR_MAX < (1 << 24));
