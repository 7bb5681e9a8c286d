//! The two-space heap: allocation, root registration, and collection
//! (spec §4.2, §4.5).
//!
//! The heap is backed by a single flat `Vec<u32>` of twice the configured
//! capacity, split into two equal halves that alternate as the active
//! semispace — this follows the re-architecture note to "allocate the heap
//! as a flat word array and phrase all object access through read/write-at-
//! offset primitives" rather than a union of typed object layouts.

mod checker;
mod gc;
pub(crate) mod object;

use crate::error::{Error, Result};
use crate::value::Value;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

/// Tunable parameters for a [`Heap`], constructed by the embedder at
/// `Heap::new` time.
#[derive(Debug, Clone, Copy)]
pub struct HeapConfig {
    /// Capacity of a single semispace, in words. Must be even (every
    /// object is 8-byte / 2-word aligned).
    pub capacity_words: usize,
    /// If set, every allocation forces a collection first, regardless of
    /// whether there is room. Used by tests to exercise the collector
    /// exhaustively (spec §4.2).
    pub collect_every_allocation: bool,
    /// If set, the two-pass heap checker (spec §4.6) runs before and
    /// after every collection.
    pub check_on_collect: bool,
}

impl Default for HeapConfig {
    /// With the `debug-checks` crate feature enabled, defaults to forcing
    /// a collection on every allocation and running the heap checker
    /// around every collection (spec §4.2 "A debug mode exists... this
    /// must be toggleable at build time"); an embedder can still override
    /// either field at runtime regardless of how this crate was built.
    fn default() -> Self {
        HeapConfig {
            capacity_words: crate::consts::DEFAULT_HEAP_WORDS,
            collect_every_allocation: cfg!(feature = "debug-checks"),
            check_on_collect: cfg!(feature = "debug-checks"),
        }
    }
}

/// Rounds `n` up to the next even number, so that the following
/// allocation lands on an 8-byte (2-word) boundary.
pub(crate) fn round_up_even(n: usize) -> usize {
    (n + 1) & !1
}

/// The managed heap: a bump allocator over the active semispace, a root
/// set, and the collector that moves between the two semispaces.
///
/// `Heap` uses interior mutability throughout (`RefCell`/`Cell`) so that
/// [`RootGuard`]s can be held across calls to [`Heap::allocate`] without
/// requiring an exclusive borrow of the heap — several guards can be
/// alive, and allocations can happen, while all of them are in scope. This
/// is the safe-Rust replacement for a `GC_BEGIN`/`GC_PROTECT`/`GC_END`
/// macro discipline over a raw pointer stack.
pub struct Heap {
    storage: RefCell<Vec<u32>>,
    capacity: usize,
    active_base: Cell<usize>,
    next: Cell<usize>,
    roots: RefCell<Vec<Rc<Cell<Value>>>>,
    config: HeapConfig,
}

impl Heap {
    /// Creates a new heap with both semispaces zeroed.
    pub fn new(config: HeapConfig) -> Self {
        assert_eq!(config.capacity_words % 2, 0, "heap capacity must be even");
        let storage = vec![0u32; config.capacity_words * 2];
        Heap {
            storage: RefCell::new(storage),
            capacity: config.capacity_words,
            active_base: Cell::new(0),
            next: Cell::new(0),
            roots: RefCell::new(Vec::new()),
            config,
        }
    }

    /// Capacity of a single semispace, in words.
    pub fn capacity_words(&self) -> usize {
        self.capacity
    }

    /// Number of words in use in the active semispace.
    pub fn used_words(&self) -> usize {
        self.next.get() - self.active_base.get()
    }

    fn active_end(&self) -> usize {
        self.active_base.get() + self.capacity
    }

    /// Reads the raw word at absolute heap index `index`.
    pub(crate) fn word_at(&self, index: usize) -> u32 {
        self.storage.borrow()[index]
    }

    /// Writes `word` at absolute heap index `index`.
    pub(crate) fn set_word_at(&self, index: usize, word: u32) {
        self.storage.borrow_mut()[index] = word;
    }

    /// Reserves `n` contiguous words in the active semispace, triggering
    /// a collection first if there is not enough room (or if
    /// `collect_every_allocation` is set). Returns the absolute word
    /// index of the reserved region. Fails with [`Error::HeapExhausted`]
    /// if a single collection does not free enough space (spec §4.2: the
    /// retry happens exactly once).
    pub(crate) fn allocate(&self, n: usize) -> Result<usize> {
        if self.config.collect_every_allocation || self.next.get() + n > self.active_end() {
            self.collect(n)?;
        }
        if self.next.get() + n > self.active_end() {
            return Err(Error::HeapExhausted(n as u32));
        }
        let start = self.next.get();
        self.next.set(start + round_up_even(n));
        Ok(start)
    }

    /// Registers `value` as a root and returns a guard that keeps it
    /// alive and up to date across collections. The guard must be
    /// dropped in LIFO order with respect to every other currently-live
    /// guard from this heap — nesting guards in reverse declaration order
    /// (as Rust's own `Drop` order does for stack locals) satisfies this
    /// automatically.
    pub fn protect(&self, value: Value) -> RootGuard<'_> {
        let cell = Rc::new(Cell::new(value));
        self.roots.borrow_mut().push(Rc::clone(&cell));
        RootGuard { heap: self, cell }
    }

    /// Forces a collection regardless of available space. Every
    /// registered root is updated in place; embedders and tests that
    /// want a specific, observable collection point (rather than relying
    /// on one being triggered incidentally by the next allocation) can
    /// call this directly.
    pub fn collect_now(&self) -> Result<()> {
        self.collect(0)
    }

    fn collect(&self, n_min: usize) -> Result<()> {
        if self.config.check_on_collect {
            checker::check(self)?;
        }

        let old_base = self.active_base.get();
        let new_base = if old_base == 0 { self.capacity } else { 0 };
        let new_end = new_base + self.capacity;

        let mut new_next = new_base;
        {
            let mut storage = self.storage.borrow_mut();
            {
                let roots = self.roots.borrow();
                for root in roots.iter() {
                    let copied = gc::copy(
                        &mut storage[..],
                        root.get(),
                        new_base as u32,
                        new_end as u32,
                        &mut new_next,
                    );
                    root.set(copied);
                }
            }

            let mut cursor = new_base;
            while cursor < new_next {
                cursor = gc::scan(&mut storage[..], cursor, new_base as u32, new_end as u32, &mut new_next)?;
            }

            // The old semispace is no longer referenced by anything live;
            // zero it so that a later checker run (or debugging) never
            // mistakes stale data for a real object.
            for word in storage[old_base..old_base + self.capacity].iter_mut() {
                *word = 0;
            }
        }

        self.active_base.set(new_base);
        self.next.set(new_next);

        let used = new_next - new_base;
        tracing::debug!(used, capacity = self.capacity, "collection complete");

        if self.config.check_on_collect {
            checker::check(self)?;
        }

        if new_end - new_next < n_min {
            return Err(Error::HeapExhausted(n_min as u32));
        }
        Ok(())
    }
}

/// An RAII root registration. While alive, the value passed to
/// [`Heap::protect`] is kept up to date across any collection that
/// happens while this guard is live; [`RootGuard::get`] always returns
/// the current (possibly moved) value.
///
/// Dropping guards out of LIFO order relative to other guards from the
/// same heap is a programming error and panics (spec §5: "interleaved
/// release is a programming error").
pub struct RootGuard<'h> {
    heap: &'h Heap,
    cell: Rc<Cell<Value>>,
}

impl<'h> RootGuard<'h> {
    /// The current value of this root.
    pub fn get(&self) -> Value {
        self.cell.get()
    }

    /// Overwrites this root's value.
    pub fn set(&self, value: Value) {
        self.cell.set(value);
    }
}

impl<'h> Drop for RootGuard<'h> {
    fn drop(&mut self) {
        let mut roots = self.heap.roots.borrow_mut();
        match roots.last() {
            Some(top) if Rc::ptr_eq(top, &self.cell) => {
                roots.pop();
            }
            _ => panic!("root stack discipline violated: guards must drop in LIFO order"),
        }
    }
}
