//! Transformation benchmarks
//!
//! Target: rebase a 1000-operation pending queue against one remote
//! operation in well under a frame (<1ms)

use coedit_ot::{
    transform, ArrayInsert, ArrayMove, ArrayRemove, DataValue, Operation, StringInsert,
    StringRemove, Unrelated,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn string_queue(len: usize) -> Vec<Operation> {
    (0..len)
        .map(|i| {
            if i % 3 == 0 {
                Operation::discrete("doc", StringRemove { index: i % 17, length: 2 })
            } else {
                Operation::discrete("doc", StringInsert { index: i % 23, value: "ab".into() })
            }
        })
        .collect()
}

fn array_queue(len: usize) -> Vec<Operation> {
    (0..len)
        .map(|i| match i % 3 {
            0 => Operation::discrete(
                "list",
                ArrayInsert { index: i % 11, value: DataValue::null(format!("n{i}")) },
            ),
            1 => Operation::discrete("list", ArrayMove { from_index: i % 7, to_index: i % 13 }),
            _ => Operation::discrete("list", ArrayRemove { index: i % 5 }),
        })
        .collect()
}

fn rebase(remote: &Operation, pending: &[Operation]) -> Operation {
    let mut remote = remote.clone();
    for op in pending {
        if let Ok(pair) = transform(&remote, op, &Unrelated) {
            remote = pair.server;
        }
    }
    remote
}

fn string_insert_insert(c: &mut Criterion) {
    let server = Operation::discrete("doc", StringInsert { index: 4, value: "hello".into() });
    let client = Operation::discrete("doc", StringInsert { index: 4, value: "world".into() });

    c.bench_function("string_insert_insert", |b| {
        b.iter(|| transform(black_box(&server), black_box(&client), &Unrelated))
    });
}

fn array_move_move(c: &mut Criterion) {
    let server = Operation::discrete("list", ArrayMove { from_index: 2, to_index: 9 });
    let client = Operation::discrete("list", ArrayMove { from_index: 7, to_index: 1 });

    c.bench_function("array_move_move", |b| {
        b.iter(|| transform(black_box(&server), black_box(&client), &Unrelated))
    });
}

fn rebase_string_queue(c: &mut Criterion) {
    let pending = string_queue(1000);
    let remote = Operation::discrete("doc", StringInsert { index: 3, value: "xyz".into() });

    c.bench_function("rebase_string_queue_1000", |b| {
        b.iter(|| rebase(black_box(&remote), black_box(&pending)))
    });
}

fn rebase_array_queue(c: &mut Criterion) {
    let pending = array_queue(1000);
    let remote = Operation::discrete("list", ArrayRemove { index: 4 });

    c.bench_function("rebase_array_queue_1000", |b| {
        b.iter(|| rebase(black_box(&remote), black_box(&pending)))
    });
}

fn compound_against_compound(c: &mut Criterion) {
    let server = Operation::compound(string_queue(50));
    let client = Operation::compound(string_queue(50));

    c.bench_function("compound_50x50", |b| {
        b.iter(|| transform(black_box(&server), black_box(&client), &Unrelated))
    });
}

criterion_group!(
    benches,
    string_insert_insert,
    array_move_move,
    rebase_string_queue,
    rebase_array_queue,
    compound_against_compound
);
criterion_main!(benches);
