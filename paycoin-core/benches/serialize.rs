use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use paycoin_core::prelude::*;

fn block_bytes() -> Bytes {
    let hex_str: String = include_str!("../tests/data/block_d189225f.hex")
        .split_whitespace()
        .collect();
    Bytes::from(hex::decode(hex_str).unwrap())
}

fn serialize_benchmark(c: &mut Criterion) {
    let bytes = block_bytes();
    let mut group = c.benchmark_group("BlockSerialize");

    for (name, config) in [
        ("eager", ParseConfig::EAGER),
        ("eager_retain", ParseConfig::EAGER_RETAIN),
        ("lazy", ParseConfig::LAZY),
        ("lazy_retain", ParseConfig::LAZY_RETAIN),
    ] {
        group.bench_function(format!("decode_{}", name), |b| {
            b.iter(|| Block::from_bytes(black_box(bytes.clone()), config).unwrap())
        });

        let block = Block::from_bytes(bytes.clone(), config).unwrap();
        group.bench_function(format!("serialize_{}", name), |b| {
            b.iter(|| black_box(&block).to_bytes().unwrap())
        });
    }

    // One edited transaction: only its path is re-encoded
    let mut block = Block::from_bytes(bytes.clone(), ParseConfig::LAZY_RETAIN).unwrap();
    block.transaction_mut(1).unwrap().set_lock_time(1).unwrap();
    group.bench_function("serialize_one_edit", |b| {
        b.iter(|| black_box(&block).to_bytes().unwrap())
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().warm_up_time(std::time::Duration::from_secs(1));
    targets = serialize_benchmark
}

criterion_main!(benches);
