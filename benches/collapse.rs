use cfdata::{
    data::{CollapseOptions, Data, DataBuilder},
    data_type::DataType,
    masked_array::MaskedArray,
};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn cube(size: usize) -> Data {
    DataBuilder::new(MaskedArray::full(&[size; 3], 1.0, DataType::Float64))
        .chunks(vec![vec![32; size / 32]; 3])
        .build()
        .unwrap()
}

fn collapse_mean(c: &mut Criterion) {
    let mut group = c.benchmark_group("collapse_mean");
    for size in [64usize, 128usize, 256usize].iter() {
        let num_elements = size * size * size;
        group.throughput(Throughput::Elements(num_elements as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = cube(size);
            let options = CollapseOptions::default();
            b.iter(|| data.mean(&options).unwrap().compute().unwrap());
        });
    }
    group.finish();
}

fn collapse_variance_axis(c: &mut Criterion) {
    let mut group = c.benchmark_group("collapse_variance_axis");
    for size in [64usize, 128usize, 256usize].iter() {
        let num_elements = size * size * size;
        group.throughput(Throughput::Elements(num_elements as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = cube(size);
            let options = CollapseOptions::default().axes(vec![0]).ddof(1.0);
            b.iter(|| data.var(&options).unwrap().compute().unwrap());
        });
    }
    group.finish();
}

fn collapse_split_every(c: &mut Criterion) {
    let mut group = c.benchmark_group("collapse_split_every");
    let data = cube(128);
    group.throughput(Throughput::Elements(128 * 128 * 128));
    for split_every in [2usize, 4usize, 8usize, 16usize].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(split_every),
            split_every,
            |b, &split_every| {
                let options = CollapseOptions::default().split_every(split_every);
                b.iter(|| data.sum(&options).unwrap().compute().unwrap());
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    collapse_mean,
    collapse_variance_axis,
    collapse_split_every
);
criterion_main!(benches);
