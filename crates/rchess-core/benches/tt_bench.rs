//! 置換表のprobe/storeスループット

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rchess_core::tt::TranspositionTable;
use rchess_core::types::{Bound, Move, Value};
use rchess_core::Position;

fn bench_tt_probe_store(c: &mut Criterion) {
    let tt = TranspositionTable::new(16);
    let pos = Position::startpos();

    // 擬似乱数キー列（xorshift）
    let mut keys = Vec::with_capacity(4096);
    let mut x = 0x9E37_79B9_7F4A_7C15u64;
    for _ in 0..4096 {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        keys.push(x);
    }

    c.bench_function("tt_store", |b| {
        let mut i = 0;
        b.iter(|| {
            let key = keys[i & 4095];
            i += 1;
            let probe = tt.probe(black_box(key), &pos);
            probe.write(
                key,
                Value::new(42),
                false,
                Bound::Lower,
                8,
                Move::NONE,
                Value::ZERO,
                tt.generation(),
            );
        });
    });

    c.bench_function("tt_probe_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            let key = keys[i & 4095];
            i += 1;
            black_box(tt.probe(black_box(key), &pos).found);
        });
    });
}

criterion_group!(benches, bench_tt_probe_store);
criterion_main!(benches);
