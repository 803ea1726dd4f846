use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flame_engine::{BatchingInputs, BatchingState};

fn advance_one_thousand_steps(inputs: &BatchingInputs) -> u32 {
    let mut state = BatchingState::new();
    let mut quality = 0.0_f64;
    let mut elapsed = 0.0_f64;
    for _ in 0..1_000 {
        let delta_t = 0.01;
        let delta_q = 0.05;
        quality += delta_q;
        elapsed += delta_t;
        state.advance(inputs, delta_t, delta_q, quality, 1_000.0, elapsed, 3_600.0);
    }
    state.batch_size()
}

fn bench_batching(c: &mut Criterion) {
    let accelerated =
        BatchingInputs { updates_per_sec: 4.0, max_batch_time_sec: 0.5, batch_accelerated: true };
    let pinned =
        BatchingInputs { updates_per_sec: 4.0, max_batch_time_sec: 0.5, batch_accelerated: false };

    c.bench_function("batching_accelerated", |b| {
        b.iter(|| black_box(advance_one_thousand_steps(&accelerated)))
    });
    c.bench_function("batching_pinned", |b| {
        b.iter(|| black_box(advance_one_thousand_steps(&pinned)))
    });
}

criterion_group!(benches, bench_batching);
criterion_main!(benches);
