use std::{
    collections::VecDeque,
    fmt,
    num::NonZeroUsize,
    sync::{Arc, RwLock},
};

use tracing::trace;

use super::{Bucket, BucketError, Eviction, EvictionPolicy, RetainedSample, SortedSamples};

struct Reservoir {
    samples: VecDeque<RetainedSample>,
    observations: u64,
    arrivals: i64,
}

impl Reservoir {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.get()),
            observations: 0,
            arrivals: 0,
        }
    }

    fn next_priority(&mut self) -> i64 {
        // Later arrivals get strictly smaller priorities.
        self.arrivals += 1;
        -self.arrivals
    }

    fn sorted(&self) -> SortedSamples {
        SortedSamples::new(
            self.samples.iter().map(RetainedSample::value).collect(),
            self.observations,
        )
    }
}

/// A bucket that retains up to a fixed number of raw samples.
///
/// When the bucket is full, its [`EvictionPolicy`] removes one retained sample before each new sample is added.
/// Quantile queries sort the retained samples and select by rank, scaled against the lifetime observation count.
pub struct AccumulatingBucket {
    capacity: NonZeroUsize,
    eviction: Arc<dyn EvictionPolicy>,
    reservoir: RwLock<Reservoir>,
}

impl AccumulatingBucket {
    /// Creates a new `AccumulatingBucket` with the given eviction policy and capacity.
    pub fn new<P>(eviction: P, capacity: NonZeroUsize) -> Self
    where
        P: EvictionPolicy + 'static,
    {
        Self::from_shared(Arc::new(eviction), capacity)
    }

    /// Creates a new `AccumulatingBucket` from a capacity that has not been validated yet.
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

    pub(super) fn from_shared(eviction: Arc<dyn EvictionPolicy>, capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            eviction,
            reservoir: RwLock::new(Reservoir::new(capacity)),
        }
    }

    /// Returns the maximum number of samples this bucket retains.
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Returns the number of samples currently retained.
    pub fn retained(&self) -> usize {
        self.reservoir.read().unwrap().samples.len()
    }

    /// Returns the retained sample values, from the earliest arrival to the latest.
    pub fn retained_values(&self) -> Vec<f64> {
        let reservoir = self.reservoir.read().unwrap();
        reservoir.samples.iter().map(RetainedSample::value).collect()
    }
}

impl Bucket for AccumulatingBucket {
    fn add(&self, value: f64) {
        let mut reservoir = self.reservoir.write().unwrap();
        let reservoir = &mut *reservoir;

        reservoir.observations += 1;

        if reservoir.samples.len() >= self.capacity.get() {
            let _evicted = self.eviction.evict(Eviction::new(&mut reservoir.samples));
            debug_assert!(reservoir.samples.len() < self.capacity.get());

            trace!(
                capacity = self.capacity.get(),
                observations = reservoir.observations,
                "Evicted retained sample to make room."
            );
        }

        let priority = reservoir.next_priority();
        reservoir.samples.push_back(RetainedSample::new(value, priority));
    }

    fn value_for_index(&self, index: u64) -> f64 {
        self.reservoir.read().unwrap().sorted().value_for_index(index)
    }

    fn value_for_quantile(&self, quantile: f64) -> f64 {
        self.reservoir.read().unwrap().sorted().value_for_quantile(quantile)
    }

    fn observations(&self) -> u64 {
        self.reservoir.read().unwrap().observations
    }

    fn retained_samples(&self) -> Option<SortedSamples> {
        Some(self.reservoir.read().unwrap().sorted())
    }

    fn reset(&self) {
        let mut reservoir = self.reservoir.write().unwrap();
        reservoir.samples.clear();
        reservoir.observations = 0;
        reservoir.arrivals = 0;
    }
}

impl fmt::Display for AccumulatingBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reservoir = self.reservoir.read().unwrap();

        write!(
            f,
            "[AccumulatingBucket with {} elements and {} capacity] {{ ",
            reservoir.samples.len(),
            self.capacity
        )?;
        for sample in &reservoir.samples {
            write!(f, "{}, ", sample.value())?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use proptest::{collection::vec as arb_vec, prelude::*};

    use super::*;
    use crate::bucket::{EvictLargest, EvictNewest, EvictOldest};

    fn new_bucket<P: EvictionPolicy + 'static>(eviction: P, capacity: usize) -> AccumulatingBucket {
        AccumulatingBucket::try_new(eviction, capacity).unwrap()
    }

    #[test]
    fn empty_bucket_is_nan() {
        let bucket = new_bucket(EvictOldest, 5);

        assert_eq!(bucket.observations(), 0);
        assert!(bucket.value_for_index(0).is_nan());
        assert!(bucket.value_for_index(100).is_nan());
        assert!(bucket.value_for_quantile(0.5).is_nan());
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            AccumulatingBucket::try_new(EvictOldest, 0),
            Err(BucketError::ZeroCapacity)
        ));
    }

    #[test]
    fn overflow_evicts_exactly_once() {
        let capacity = 5;
        let bucket = new_bucket(EvictOldest, capacity);

        for i in 0..capacity {
            bucket.add(i as f64);
        }
        assert_eq!(bucket.retained(), capacity);

        bucket.add(100.0);
        assert_eq!(bucket.retained(), capacity);
        assert_eq!(bucket.observations(), capacity as u64 + 1);
        assert_eq!(bucket.retained_values(), vec![1.0, 2.0, 3.0, 4.0, 100.0]);
    }

    #[test]
    fn priorities_decrease_with_arrival() {
        let bucket = new_bucket(EvictOldest, 4);
        for value in [1.0, 2.0, 3.0] {
            bucket.add(value);
        }

        let reservoir = bucket.reservoir.read().unwrap();
        let priorities = reservoir.samples.iter().map(RetainedSample::priority).collect::<Vec<_>>();
        assert_eq!(priorities, vec![-1, -2, -3]);
    }

    #[test]
    fn evict_newest_keeps_first_arrivals() {
        let bucket = new_bucket(EvictNewest, 3);
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            bucket.add(value);
        }

        assert_eq!(bucket.retained_values(), vec![1.0, 2.0, 5.0]);
    }

    #[test]
    fn evict_largest_trims_outliers() {
        let bucket = new_bucket(EvictLargest, 3);
        for value in [1.0, 1000.0, 2.0, 3.0] {
            bucket.add(value);
        }

        assert_eq!(bucket.retained_values(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn index_scaled_by_lifetime_observations() {
        let bucket = new_bucket(EvictOldest, 10);
        for value in [5.0, 1.0, 4.0, 2.0, 3.0] {
            bucket.add(value);
        }

        assert_eq!(bucket.value_for_index(0), 1.0);
        assert_eq!(bucket.value_for_index(2), 2.0);
        assert_eq!(bucket.value_for_index(5), 5.0);
        assert_eq!(bucket.value_for_quantile(0.5), 2.0);
        assert_eq!(bucket.value_for_quantile(1.0), 5.0);

        // Past capacity, an index is mapped onto the retained samples relative to every observation ever made.
        let bucket = new_bucket(EvictOldest, 2);
        for value in [10.0, 20.0, 30.0, 40.0] {
            bucket.add(value);
        }
        assert_eq!(bucket.value_for_index(3), 30.0);
        assert_eq!(bucket.value_for_index(4), 40.0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn index_beyond_observations_panics() {
        let bucket = new_bucket(EvictOldest, 2);
        bucket.add(1.0);
        bucket.value_for_index(2);
    }

    #[test]
    fn reset_clears_everything() {
        let bucket = new_bucket(EvictOldest, 3);
        for value in [1.0, 2.0, 3.0, 4.0] {
            bucket.add(value);
        }

        bucket.reset();
        assert_eq!(bucket.observations(), 0);
        assert_eq!(bucket.retained(), 0);
        assert!(bucket.value_for_index(0).is_nan());

        bucket.add(7.0);
        assert_eq!(bucket.value_for_index(1), 7.0);
    }

    #[test]
    fn display() {
        let bucket = new_bucket(EvictOldest, 4);
        assert_eq!(bucket.to_string(), "[AccumulatingBucket with 0 elements and 4 capacity] { }");

        bucket.add(1.5);
        bucket.add(2.0);
        assert_eq!(
            bucket.to_string(),
            "[AccumulatingBucket with 2 elements and 4 capacity] { 1.5, 2, }"
        );
    }

    #[test]
    fn concurrent_adds_then_reset() {
        let bucket = Arc::new(new_bucket(EvictOldest, 16));

        let handles = (0..8)
            .map(|worker| {
                let bucket = Arc::clone(&bucket);
                thread::spawn(move || {
                    for i in 0..1000 {
                        bucket.add((worker * 1000 + i) as f64);
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(bucket.observations(), 8000);
        assert_eq!(bucket.retained(), 16);

        bucket.reset();
        assert_eq!(bucket.observations(), 0);
        assert!(bucket.value_for_quantile(0.99).is_nan());
    }

    proptest! {
        #[test]
        fn property_test_capacity_invariant(capacity in 1usize..32, values in arb_vec(-1.0e9..1.0e9f64, 0..256)) {
            let bucket = new_bucket(EvictOldest, capacity);
            for value in &values {
                bucket.add(*value);
                prop_assert!(bucket.retained() <= capacity);
            }

            prop_assert_eq!(bucket.observations(), values.len() as u64);
            prop_assert_eq!(bucket.retained(), values.len().min(capacity));
        }

        #[test]
        fn property_test_quantile_is_retained(capacity in 1usize..32, values in arb_vec(-1.0e9..1.0e9f64, 1..256), quantile in 0.0..=1.0f64) {
            let bucket = new_bucket(EvictOldest, capacity);
            for value in &values {
                bucket.add(*value);
            }

            let estimate = bucket.value_for_quantile(quantile);
            prop_assert!(bucket.retained_values().contains(&estimate));
        }
    }
}
