use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tfdataflow::pipeline::trace_operations;
use tfdataflow::*;

// Latency of each reconstruction phase on representative expressions.

const SCENARIOS: &[(&str, &str)] = &[
    ("unary", "tf.abs(in1)"),
    ("reduce_axis", "tf.reduce_sum(in1, axis=1)"),
    ("segments", "tf.math.unsorted_segment_sum(in1, [0, 1, 0, 1], 2)"),
    ("nested", "tf.gather(tf.transpose(in1), tf.argsort(tf.reduce_max(in1, axis=0), axis=0))"),
    ("primitives", "(in1[:, 1:3], tf.where(tf.greater(in1, 0), in1, tf.zeros_like(in1)))"),
];

fn bindings(n: usize) -> Bindings {
    let rows: Vec<String> = (0..n)
        .map(|r| {
            let cols: Vec<String> = (0..4).map(|c| ((r * 4 + c) as i64 - 7).to_string()).collect();
            format!("[{}]", cols.join(", "))
        })
        .collect();
    let mut b = Bindings::new();
    // Construction inputs are fixed; a failure here is a broken benchmark.
    b.assign(&format!("in1=[{}]", rows.join(", "))).unwrap();
    b
}

fn bench_parse_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("dataflow/parse_resolve");
    let catalog = Catalog::standard();
    for &(name, text) in SCENARIOS {
        group.bench_with_input(BenchmarkId::from_parameter(name), text, |b, text| {
            b.iter(|| {
                let call = parser::parse(black_box(text)).unwrap();
                black_box(resolve::resolve(&call, catalog).ok());
            });
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("dataflow/build_value");
    let catalog = Catalog::standard();
    let inputs = bindings(4);
    for &(name, text) in SCENARIOS {
        group.bench_with_input(BenchmarkId::from_parameter(name), text, |b, text| {
            b.iter(|| black_box(value_from_text(black_box(text), &inputs, catalog).unwrap()));
        });
    }
    group.finish();
}

fn bench_trace(c: &mut Criterion) {
    let mut group = c.benchmark_group("dataflow/trace");
    let catalog = Catalog::standard();
    let inputs = bindings(4);
    for &(name, text) in SCENARIOS {
        let value = value_from_text(text, &inputs, catalog).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &value, |b, value| {
            b.iter(|| black_box(trace_operations(value, catalog).unwrap()));
        });
    }
    group.finish();
}

fn bench_graph_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("dataflow/graph_scaling");
    let catalog = Catalog::standard();
    for rows in [4_usize, 16, 64, 256] {
        let inputs = bindings(rows);
        let value = value_from_text("tf.reduce_sum(tf.add(in1, in1), axis=1)", &inputs, catalog).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(format!("{rows}rows")), &value, |b, value| {
            b.iter(|| black_box(build_graph(value, catalog, GraphOptions::default()).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse_resolve,
    bench_build,
    bench_trace,
    bench_graph_scaling,
);
criterion_main!(benches);
