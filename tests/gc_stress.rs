//! The long-chain collection scenario of spec §8 item 6: build a large
//! singly-linked cons chain, sever it down to its two ends, force a
//! collection, and confirm exactly the orphaned middle was reclaimed and
//! the two surviving pairs kept their content.

mod support;

use minilisp_rt::constructors::{car, cdr, cons, set_cdr};
use minilisp_rt::prelude::*;
use support::{fx, test_heap};

const CHAIN_LEN: usize = 50_000;

#[test]
fn severing_a_chain_reclaims_exactly_the_orphaned_middle() {
    // Two semispaces of this size comfortably hold 50,000 two-word pairs
    // plus bootstrap overhead with room to spare, so no collection should
    // happen incidentally during construction.
    let heap = test_heap(CHAIN_LEN * 4 + 4096);

    let first = heap.protect(Value::EMPTY_LIST);
    let last = heap.protect(Value::EMPTY_LIST);

    {
        // `head` walks the chain as it grows; it is the only thing
        // keeping the middle alive once construction finishes, and
        // severing `last`'s cdr (below) drops it entirely.
        let head = heap.protect(Value::EMPTY_LIST);
        let mut tail = cons(&heap, fx(0), Value::EMPTY_LIST).unwrap();
        head.set(tail);
        first.set(tail);
        for i in 1..CHAIN_LEN {
            let next = cons(&heap, fx(i as i32), Value::EMPTY_LIST).unwrap();
            set_cdr(&heap, tail, next);
            tail = next;
            head.set(first.get());
        }
        last.set(tail);

        let used_before_severing = heap.used_words();
        assert_eq!(used_before_severing, CHAIN_LEN * 2);

        // Sever the chain: `last` no longer reaches back through the
        // middle, and nothing outside this block reaches `head`, so once
        // `head` drops, the 49,998 interior pairs become unreachable.
        set_cdr(&heap, last.get(), Value::EMPTY_LIST);
        head.set(Value::EMPTY_LIST);
    }

    heap.collect_now().unwrap();

    let freed = CHAIN_LEN * 2 - heap.used_words();
    assert_eq!(freed, (CHAIN_LEN - 2) * 2);

    assert!(car(&heap, first.get()).is_fixnum());
    assert_eq!(car(&heap, first.get()).as_fixnum(), 0);
    assert!(cdr(&heap, first.get()).is_empty_list());

    assert_eq!(car(&heap, last.get()).as_fixnum(), (CHAIN_LEN - 1) as i32);
    assert!(cdr(&heap, last.get()).is_empty_list());
}
