use cfdata::{
    data::{Data, DataBuilder, Index, Slice},
    data_type::DataType,
    masked_array::MaskedArray,
};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn grid(size: usize) -> Data {
    DataBuilder::new(MaskedArray::full(&[size; 2], 1.0, DataType::Float32))
        .chunks(vec![vec![64; size / 64]; 2])
        .cyclic(vec![1])
        .build()
        .unwrap()
}

fn subspace_slice(c: &mut Criterion) {
    let mut group = c.benchmark_group("subspace_slice");
    for size in [256usize, 1024usize, 4096usize].iter() {
        group.throughput(Throughput::Elements((size * size / 4) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = grid(size);
            let half = isize::try_from(size / 2).unwrap();
            let indices = [
                Index::Slice(Slice::range(0, half)),
                Index::Slice(Slice::range(0, half)),
            ];
            b.iter(|| data.getitem(&indices).unwrap().compute().unwrap());
        });
    }
    group.finish();
}

fn subspace_cyclic(c: &mut Criterion) {
    let mut group = c.benchmark_group("subspace_cyclic");
    for size in [256usize, 1024usize, 4096usize].iter() {
        group.throughput(Throughput::Elements((size * size / 2) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = grid(size);
            let quarter = isize::try_from(size / 4).unwrap();
            let indices = [Index::Ellipsis, Index::Slice(Slice::range(-quarter, quarter))];
            b.iter(|| data.getitem(&indices).unwrap().compute().unwrap());
        });
    }
    group.finish();
}

fn subspace_orthogonal(c: &mut Criterion) {
    let mut group = c.benchmark_group("subspace_orthogonal");
    for size in [256usize, 1024usize, 4096usize].iter() {
        let list: Vec<isize> = (0..isize::try_from(*size).unwrap()).step_by(3).collect();
        group.throughput(Throughput::Elements((list.len() * list.len()) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = grid(size);
            let indices = [Index::List(list.clone()), Index::List(list.clone())];
            b.iter(|| data.getitem(&indices).unwrap().compute().unwrap());
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    subspace_slice,
    subspace_cyclic,
    subspace_orthogonal
);
criterion_main!(benches);
