use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use strided_loops::{
    emit_loop, reorder_loop, LevelTasks, LoopConfig, LoopOrder, OperandDesc, StridedArray,
};

fn bench_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit");
    for rank in [2usize, 4, 6] {
        let dims = vec![4usize; rank];
        let out = OperandDesc::row_major(&dims);
        let inp = OperandDesc::col_major(&dims);
        let orders = [LoopOrder::identity(rank), LoopOrder::identity(rank)];
        let config = LoopConfig::sequential();

        group.bench_with_input(BenchmarkId::new("canonical", rank), &rank, |b, &rank| {
            b.iter(|| {
                emit_loop(
                    black_box(&[&out, &inp]),
                    &orders,
                    LevelTasks::inner_only(rank, ()),
                    &config,
                )
            })
        });
        group.bench_with_input(BenchmarkId::new("reordered", rank), &rank, |b, _| {
            b.iter(|| reorder_loop(black_box(&[&out, &inp]), &orders, 0, (), &config))
        });
    }
    group.finish();
}

fn bench_transpose_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("transpose_add");
    for size in [64usize, 256, 512] {
        group.throughput(Throughput::Elements((size * size) as u64));

        let a = StridedArray::<f64>::from_fn_row_major(&[size, size], |i| (i[0] * size + i[1]) as f64);
        let b = StridedArray::<f64>::from_fn_row_major(&[size, size], |i| i[0] as f64);
        let mut out = StridedArray::<f64>::col_major(&[size, size]);
        // out[i, j] = a[j, i] + b[i, j]
        let orders = [
            LoopOrder::identity(2),
            LoopOrder::parse("1,0").expect("valid loop order"),
            LoopOrder::identity(2),
        ];
        let config = LoopConfig::sequential();

        let canonical = emit_loop(&[&out, &a, &b], &orders, LevelTasks::inner_only(2, ()), &config)
            .expect("valid operands");
        let reordered = reorder_loop(&[&out, &a, &b], &orders, 0, (), &config).expect("valid operands");

        group.bench_with_input(BenchmarkId::new("canonical", size), &size, |bench, _| {
            bench.iter(|| {
                canonical.for_each_element(|o| {
                    out.data_mut()[o[0] as usize] = a.data()[o[1] as usize] + b.data()[o[2] as usize];
                })
            })
        });
        group.bench_with_input(BenchmarkId::new("reordered", size), &size, |bench, _| {
            bench.iter(|| {
                reordered.for_each_element(|o| {
                    out.data_mut()[o[0] as usize] = a.data()[o[1] as usize] + b.data()[o[2] as usize];
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_emit, bench_transpose_add);
criterion_main!(benches);
