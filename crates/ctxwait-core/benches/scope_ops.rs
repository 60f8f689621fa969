use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ctxwait_core::Context;

fn nested(depth: usize) -> Context {
    (0..depth).fold(Context::background(), |ctx, i| ctx.with_value(i))
}

fn bench_with_wait(c: &mut Criterion) {
    let plain = Context::background();
    c.bench_function("with_wait/new_scope", |b| {
        b.iter(|| black_box(plain.with_wait()))
    });

    let (scoped, _waiter) = Context::background().with_wait();
    c.bench_function("with_wait/inherited", |b| {
        b.iter(|| black_box(scoped.with_wait()))
    });
}

fn bench_complete(c: &mut Criterion) {
    let mut group = c.benchmark_group("complete_depth");
    for depth in [0usize, 8, 64] {
        let (scoped, _waiter) = Context::background().with_wait();
        let leaf = (0..depth).fold(scoped, |ctx, i| ctx.with_value(i));
        leaf.complete();
        group.bench_with_input(BenchmarkId::from_parameter(depth), &leaf, |b, leaf| {
            b.iter(|| leaf.complete())
        });
    }
    group.finish();

    let unscoped = nested(64);
    c.bench_function("complete/no_scope", |b| b.iter(|| unscoped.complete()));
}

criterion_group!(benches, bench_with_wait, bench_complete);
criterion_main!(benches);
