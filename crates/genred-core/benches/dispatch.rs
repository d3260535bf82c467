use std::os::raw::{c_int, c_void};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use genred_core::{invoke, parse_types, resolve, Backend, BackendHint, ReductionArray};
use genred_loader::{RoutinePair, RoutineSet, SumIndex};
use ndarray::Array2;

/// Routine that returns immediately, so only dispatch overhead is measured
unsafe extern "C" fn empty_routine(_: c_int, _: c_int, _: *mut c_void, _: *mut *mut c_void) {}

fn benchmark_resolve(c: &mut Criterion) {
    let parsed = parse_types(&["out = Vx(2)", "x = Vx(3)", "y = Vy(3)", "b = Vy(2)"]).unwrap();
    let mut group = c.benchmark_group("resolve");

    for size in [100, 10_000, 1_000_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |bench, &n| {
            let x = Array2::<f32>::zeros((n, 3));
            let y = Array2::<f32>::zeros((n, 3));
            let b = Array2::<f32>::zeros((n, 2));
            let out = Array2::<f32>::zeros((n, 2));
            let args: [&dyn ReductionArray; 3] = [&x, &y, &b];

            bench.iter(|| {
                let resolution = resolve(&parsed.signature, parsed.sum_index, &out, &args, BackendHint::Auto).unwrap();
                black_box(resolution);
            });
        });
    }

    group.finish();
}

fn benchmark_invoke(c: &mut Criterion) {
    let routines = RoutineSet::from_entry_points("empty", RoutinePair::new(empty_routine, empty_routine), None);
    let x = Array2::<f32>::zeros((1_000, 3));
    let y = Array2::<f32>::zeros((1_000, 3));
    let b = Array2::<f32>::zeros((1_000, 2));
    let mut out = Array2::<f32>::zeros((1_000, 2));

    c.bench_function("invoke_empty_routine", |bench| {
        bench.iter(|| {
            invoke(&routines, Backend::Cpu, SumIndex::Row, 1_000, 1_000, &mut out, &[&x, &y, &b]).unwrap();
            black_box(out.len());
        });
    });
}

criterion_group!(benches, benchmark_resolve, benchmark_invoke);
criterion_main!(benches);
