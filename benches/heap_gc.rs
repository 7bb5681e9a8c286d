use criterion::{black_box, criterion_group, criterion_main, Criterion};
use minilisp_rt::constructors::{cons, intern};
use minilisp_rt::prelude::*;

fn build_symbol_chain(heap: &Heap, builtins: &Builtins, len: usize) -> Value {
    let head = heap.protect(Value::EMPTY_LIST);
    let mut chain = Value::EMPTY_LIST;
    for i in 0..len {
        let name = format!("sym-{i}");
        let sym = intern(heap, builtins, name.as_bytes()).unwrap();
        chain = cons(heap, sym, chain).unwrap();
        head.set(chain);
    }
    head.get()
}

fn allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation");

    group.bench_function("cons chain of 10,000 interned symbols", |b| {
        b.iter(|| {
            let heap = Heap::new(HeapConfig {
                capacity_words: 2_000_000,
                collect_every_allocation: false,
                check_on_collect: false,
            });
            let builtins = Builtins::bootstrap(&heap).unwrap();
            black_box(build_symbol_chain(&heap, &builtins, 10_000));
        })
    });

    group.finish();
}

fn collection(c: &mut Criterion) {
    let heap = Heap::new(HeapConfig {
        capacity_words: 2_000_000,
        collect_every_allocation: false,
        check_on_collect: false,
    });
    let builtins = Builtins::bootstrap(&heap).unwrap();
    let chain = heap.protect(build_symbol_chain(&heap, &builtins, 50_000));
    black_box(chain.get());

    let mut group = c.benchmark_group("collection");

    group.bench_function("forced collection over a live 50,000-symbol chain", |b| {
        b.iter(|| black_box(heap.collect_now()).unwrap())
    });

    group.finish();
}

criterion_group!(benches, allocation, collection);
criterion_main!(benches);
