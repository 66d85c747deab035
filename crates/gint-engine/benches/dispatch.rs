use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gint_engine::{make_kernel, Engine3, Gaussian, Overlap3, Overlap3Factory, Shell, ThreeCenterKernel};

fn bench_lookup(c: &mut Criterion) {
    let p = Gaussian::primitive(1, 0.8).unwrap();
    let d = Gaussian::primitive(2, 0.5).unwrap();
    let factory = Overlap3Factory::new(&p, &p, &d);
    let (ab, x) = factory.parameters();

    let mut group = c.benchmark_group("kernel_selection");
    group.bench_function("table_lookup", |bench| {
        bench.iter(|| make_kernel(black_box(&factory), black_box(ab), black_box(x)).unwrap())
    });
    group.bench_function("direct", |bench| {
        bench.iter(|| Box::new(Overlap3::<2, 2>::new(black_box(&p), &p, &d)) as Box<dyn ThreeCenterKernel>)
    });
    group.finish();
}

fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine3_compute");
    for l in 0..=2 {
        let g = Gaussian::new(l, &[(2.1, 0.3), (0.6, 0.5), (0.15, 0.4)]).unwrap();
        let engine = Engine3::new(
            vec![Shell::new(g.clone(), [0.0; 3]), Shell::new(g.clone(), [0.0, 0.0, 1.4])],
            vec![Shell::new(g, [0.3, 0.2, 0.7])],
        );
        let mut values = vec![0.0; engine.integral_count([0, 1, 0]).unwrap()];
        group.bench_with_input(BenchmarkId::from_parameter(l), &l, |bench, _| {
            bench.iter(|| engine.compute([([0, 1, 0], values.as_mut_slice())]).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lookup, bench_compute);
criterion_main!(benches);
