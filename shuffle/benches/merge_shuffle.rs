use {
    criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion},
    riffle_shuffle::{
        list::LinkedList,
        merge_shuffle::{shuffle, ShuffleConfig},
    },
};

const NUM_NODES: u64 = 1 << 16;

fn make_list() -> LinkedList<u64> {
    (0..NUM_NODES).collect()
}

fn bench_shuffle_sequential(c: &mut Criterion) {
    let config = ShuffleConfig::sequential_seeded(42);
    c.bench_function("bench_shuffle_sequential", |b| {
        b.iter_batched(
            make_list,
            |mut list| {
                shuffle(&mut list, &config);
                black_box(list);
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_shuffle_parallel(c: &mut Criterion) {
    let config = ShuffleConfig::parallel().with_sequential_threshold(1 << 12);
    c.bench_function("bench_shuffle_parallel", |b| {
        b.iter_batched(
            make_list,
            |mut list| {
                shuffle(&mut list, &config);
                black_box(list);
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_shuffle_deterministic(c: &mut Criterion) {
    let config = ShuffleConfig::deterministic(42).with_sequential_threshold(1 << 12);
    c.bench_function("bench_shuffle_deterministic", |b| {
        b.iter_batched(
            make_list,
            |mut list| {
                shuffle(&mut list, &config);
                black_box(list);
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_shuffle_sequential,
    bench_shuffle_parallel,
    bench_shuffle_deterministic,
);
criterion_main!(benches);
