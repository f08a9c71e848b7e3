//! Bounded-memory buckets for answering quantile queries over a stream of observations.

use std::{fmt, num::NonZeroUsize, sync::Arc};

use snafu::Snafu;

mod accumulating;
pub use self::accumulating::AccumulatingBucket;

mod estimator;
pub use self::estimator::{
    AverageEstimator, EmptyGuard, IndexEstimator, MaximumEstimator, MinimumEstimator, UniformEstimator,
};

mod eviction;
pub use self::eviction::{
    CoalesceOldest, Evicted, Eviction, EvictionPolicy, EvictLargest, EvictNewest, EvictOldest, EvictRandom,
    EvictSmallest, RetainedSample,
};

mod tallying;
pub use self::tallying::TallyingBucket;

/// Bucket error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum BucketError {
    /// A bucket was configured to retain no samples at all.
    #[snafu(display("bucket capacity must be greater than zero"))]
    ZeroCapacity,
}

/// Condensed state for one series of observations.
///
/// Buckets are shared between every caller recording into the same series, so all methods take `&self` and
/// implementations guard their state with a single reader/writer lock. Adding and resetting take the lock exclusively,
/// while queries only need shared access.
///
/// Queries against a bucket without observations always return NaN.
pub trait Bucket: fmt::Display + Send + Sync {
    /// Records a single observation.
    fn add(&self, value: f64);

    /// Returns the value found at `index` within the lifetime observations of this bucket.
    ///
    /// `index` ranges from 0 to [`observations`][Bucket::observations], inclusive.
    ///
    /// # Panics
    ///
    /// Implementations panic if the bucket is not empty and `index` exceeds the number of observations.
    fn value_for_index(&self, index: u64) -> f64;

    /// Returns the value at the given quantile.
    ///
    /// This is equivalent to calling [`value_for_index`][Bucket::value_for_index] with `⌊quantile · observations⌋`,
    /// except that the observation count and the lookup are read together, without a concurrent writer being able to
    /// change the count in between.
    ///
    /// # Panics
    ///
    /// Panics if `quantile` is not within `[0, 1]`.
    fn value_for_quantile(&self, quantile: f64) -> f64;

    /// Returns the number of observations recorded since creation or the last reset.
    fn observations(&self) -> u64;

    /// Returns the raw samples this bucket currently retains, or `None` if it does not keep raw samples at all.
    ///
    /// The retained samples may be far fewer than the lifetime observations once a bounded bucket has filled up.
    fn retained_samples(&self) -> Option<SortedSamples> {
        None
    }

    /// Clears all state, as if the bucket had just been created.
    fn reset(&self);
}

/// Samples retained by a bucket in ascending order, read together with the bucket's lifetime observation count.
#[derive(Clone, Debug, PartialEq)]
pub struct SortedSamples {
    values: Vec<f64>,
    observations: u64,
}

impl SortedSamples {
    pub(crate) fn new(mut values: Vec<f64>, observations: u64) -> Self {
        values.sort_unstable_by(f64::total_cmp);
        Self { values, observations }
    }

    /// Returns the retained values, smallest first.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Returns the number of retained values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no values are retained.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the number of observations recorded by the bucket, retained or not.
    pub fn observations(&self) -> u64 {
        self.observations
    }

    /// Returns the retained value at `index` within the lifetime observations, or NaN if nothing is retained.
    ///
    /// The index is scaled against the lifetime observation count rather than the number of retained values, so callers
    /// can ask for an index without knowing how many values were actually kept.
    ///
    /// # Panics
    ///
    /// Panics if values are retained and `index` exceeds the number of observations.
    pub fn value_for_index(&self, index: u64) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }

        assert!(
            index <= self.observations,
            "index {} out of range for {} observations",
            index,
            self.observations
        );

        let position = ((self.values.len() - 1) as f64 * (index as f64 / self.observations as f64)) as usize;
        self.values[position]
    }

    /// Returns the retained value at `quantile`, or NaN if nothing is retained.
    ///
    /// # Panics
    ///
    /// Panics if `quantile` is not within `[0, 1]`.
    pub fn value_for_quantile(&self, quantile: f64) -> f64 {
        self.value_for_index(quantile_to_index(quantile, self.observations))
    }
}

pub(crate) fn quantile_to_index(quantile: f64, observations: u64) -> u64 {
    assert!(
        (0.0..=1.0).contains(&quantile),
        "quantile must be within [0, 1], got {}",
        quantile
    );

    (quantile * observations as f64).floor() as u64
}

/// Creates empty buckets on demand.
///
/// A summary holds one builder and calls it whenever a new series is first observed.
pub trait BucketBuilder: Send + Sync {
    /// Creates a new, empty bucket.
    fn build(&self) -> Box<dyn Bucket>;
}

impl<F> BucketBuilder for F
where
    F: Fn() -> Box<dyn Bucket> + Send + Sync,
{
    fn build(&self) -> Box<dyn Bucket> {
        self()
    }
}

/// Builds [`AccumulatingBucket`]s with a shared capacity and eviction policy.
#[derive(Clone)]
pub struct AccumulatingBucketBuilder {
    capacity: NonZeroUsize,
    eviction: Arc<dyn EvictionPolicy>,
}

impl AccumulatingBucketBuilder {
    /// Creates a new `AccumulatingBucketBuilder` with the given eviction policy and capacity.
    pub fn new<P>(eviction: P, capacity: NonZeroUsize) -> Self
    where
        P: EvictionPolicy + 'static,
    {
        Self {
            capacity,
            eviction: Arc::new(eviction),
        }
    }

    /// Creates a new `AccumulatingBucketBuilder` from a capacity that has not been validated yet.
    ///
    /// # Errors
    ///
    /// If `capacity` is zero, an error is returned.
    pub fn try_new<P>(eviction: P, capacity: usize) -> Result<Self, BucketError>
    where
        P: EvictionPolicy + 'static,
    {
        let capacity = NonZeroUsize::new(capacity).ok_or(BucketError::ZeroCapacity)?;
        Ok(Self::new(eviction, capacity))
    }

    pub(crate) fn from_shared(eviction: Arc<dyn EvictionPolicy>, capacity: NonZeroUsize) -> Self {
        Self { capacity, eviction }
    }

    /// Returns the capacity of the buckets this builder creates.
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }
}

impl BucketBuilder for AccumulatingBucketBuilder {
    fn build(&self) -> Box<dyn Bucket> {
        Box::new(AccumulatingBucket::from_shared(Arc::clone(&self.eviction), self.capacity))
    }
}

/// Builds [`TallyingBucket`]s with a shared index estimator.
#[derive(Clone)]
pub struct TallyingBucketBuilder {
    estimator: Arc<dyn IndexEstimator>,
}

impl TallyingBucketBuilder {
    /// Creates a new `TallyingBucketBuilder` using the given index estimator.
    pub fn new<E>(estimator: E) -> Self
    where
        E: IndexEstimator + 'static,
    {
        Self {
            estimator: Arc::new(estimator),
        }
    }
}

impl Default for TallyingBucketBuilder {
    fn default() -> Self {
        Self::new(MinimumEstimator)
    }
}

impl BucketBuilder for TallyingBucketBuilder {
    fn build(&self) -> Box<dyn Bucket> {
        Box::new(TallyingBucket::from_shared(Arc::clone(&self.estimator)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulating_builder_rejects_zero_capacity() {
        let result = AccumulatingBucketBuilder::try_new(EvictOldest, 0);
        assert!(matches!(result, Err(BucketError::ZeroCapacity)));

        let builder = AccumulatingBucketBuilder::try_new(EvictOldest, 4).unwrap();
        assert_eq!(builder.capacity().get(), 4);
    }

    #[test]
    fn builders_create_independent_buckets() {
        let builders: Vec<Box<dyn BucketBuilder>> = vec![
            Box::new(AccumulatingBucketBuilder::try_new(EvictOldest, 4).unwrap()),
            Box::new(TallyingBucketBuilder::default()),
            Box::new(|| -> Box<dyn Bucket> { Box::new(TallyingBucket::with_estimator(MaximumEstimator)) }),
        ];

        for builder in builders {
            let first = builder.build();
            let second = builder.build();

            first.add(1.0);
            assert_eq!(first.observations(), 1);
            assert_eq!(second.observations(), 0);
            assert!(second.value_for_index(0).is_nan());
        }
    }

    #[test]
    fn only_accumulating_buckets_retain_samples() {
        let accumulating = AccumulatingBucketBuilder::try_new(EvictOldest, 3).unwrap().build();
        let tallying = TallyingBucketBuilder::default().build();
        for value in [4.0, 1.0, 3.0, 2.0] {
            accumulating.add(value);
            tallying.add(value);
        }

        let samples = accumulating.retained_samples().unwrap();
        assert_eq!(samples.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples.observations(), 4);
        assert_eq!(samples.value_for_quantile(1.0), 3.0);

        assert_eq!(tallying.retained_samples(), None);
    }

    #[test]
    fn sorted_samples_without_values() {
        let samples = SortedSamples::new(Vec::new(), 0);
        assert!(samples.is_empty());
        assert!(samples.value_for_index(0).is_nan());
        assert!(samples.value_for_quantile(0.5).is_nan());
    }

    #[test]
    fn quantile_to_index_floors() {
        assert_eq!(quantile_to_index(0.0, 10), 0);
        assert_eq!(quantile_to_index(0.55, 10), 5);
        assert_eq!(quantile_to_index(1.0, 10), 10);
        assert_eq!(quantile_to_index(0.5, 0), 0);
    }

    #[test]
    #[should_panic(expected = "quantile must be within [0, 1]")]
    fn quantile_to_index_rejects_out_of_range() {
        quantile_to_index(1.5, 10);
    }
}
