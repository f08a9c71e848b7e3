use std::num::NonZeroUsize;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::SeedableRng;
use rand_distr::{Distribution, Pareto};
use summit_core::bucket::{
    AccumulatingBucket, Bucket, EvictOldest, EvictRandom, EvictSmallest, EvictionPolicy, TallyingBucket,
    UniformEstimator,
};

fn insert_and_query(bucket: &dyn Bucket, values: &[f64]) {
    for value in values {
        bucket.add(*value);
    }

    let _ = bucket.value_for_quantile(0.99);
}

fn latency_samples(size: usize) -> Vec<f64> {
    // Latency-shaped samples in microseconds: a big hump at the beginning with a long tail, bottoming out at 15
    // milliseconds and tailing off up to 10 seconds.
    let distribution = Pareto::new(1.0, 1.0).expect("pareto distribution should be valid");
    let mut rng = rand::rngs::SmallRng::seed_from_u64(0xC0FFEE);

    distribution
        .sample_iter(&mut rng)
        .map(|n| n * 10_000.0)
        .filter(|n| *n > 15_000.0 && *n < 10_000_000.0)
        .take(size)
        .collect()
}

fn bench_accumulating<P>(c: &mut Criterion, eviction: P)
where
    P: EvictionPolicy + Copy + 'static,
{
    let sizes = [10, 100, 1_000, 10_000];
    let capacity = NonZeroUsize::new(256).expect("capacity should be non-zero");

    let mut group = c.benchmark_group(format!("accumulating/{}", std::any::type_name::<P>()));
    for size in sizes.iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let values = latency_samples(size);
            b.iter(|| insert_and_query(&AccumulatingBucket::new(eviction, capacity), &values));
        });
    }
    group.finish();
}

fn bench_buckets(c: &mut Criterion) {
    bench_accumulating(c, EvictOldest);
    bench_accumulating(c, EvictRandom);
    bench_accumulating(c, EvictSmallest);

    let mut group = c.benchmark_group("tallying/uniform");
    for size in [10, 100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let values = latency_samples(size);
            b.iter(|| insert_and_query(&TallyingBucket::with_estimator(UniformEstimator), &values));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_buckets);
criterion_main!(benches);
