use std::{
    fmt,
    sync::{Arc, RwLock},
};

use super::{quantile_to_index, Bucket, EmptyGuard, IndexEstimator, MinimumEstimator};

#[derive(Clone, Copy)]
struct Tally {
    minimum: f64,
    maximum: f64,
    observations: u64,
}

impl Tally {
    // The sentinels lose both comparisons against any real observation, negative values included.
    const EMPTY: Self = Self {
        minimum: f64::INFINITY,
        maximum: f64::NEG_INFINITY,
        observations: 0,
    };
}

/// A bucket that keeps only the observed extrema and a count.
///
/// State is constant-size no matter how long the stream gets. Quantile queries are answered by an [`IndexEstimator`]
/// interpolating between the extrema, which is coarse but cheap.
pub struct TallyingBucket {
    estimator: EmptyGuard,
    tally: RwLock<Tally>,
}

impl TallyingBucket {
    /// Creates a new `TallyingBucket` that reports the smallest observed value for every index.
    pub fn new() -> Self {
        Self::with_estimator(MinimumEstimator)
    }

    /// Creates a new `TallyingBucket` using the given index estimator.
    pub fn with_estimator<E>(estimator: E) -> Self
    where
        E: IndexEstimator + 'static,
    {
        Self::from_shared(Arc::new(estimator))
    }

    pub(super) fn from_shared(estimator: Arc<dyn IndexEstimator>) -> Self {
        Self {
            estimator: EmptyGuard::from_shared(estimator),
            tally: RwLock::new(Tally::EMPTY),
        }
    }

    /// Returns the smallest and largest observed values, or `None` if nothing has been observed.
    pub fn extrema(&self) -> Option<(f64, f64)> {
        let tally = self.tally.read().unwrap();
        (tally.observations > 0).then_some((tally.minimum, tally.maximum))
    }

    fn estimate(&self, tally: &Tally, index: u64) -> f64 {
        if tally.observations > 0 {
            assert!(
                index <= tally.observations,
                "index {} out of range for {} observations",
                index,
                tally.observations
            );
        }

        self.estimator
            .estimate(tally.minimum, tally.maximum, index, tally.observations)
    }
}

impl Default for TallyingBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl Bucket for TallyingBucket {
    fn add(&self, value: f64) {
        let mut tally = self.tally.write().unwrap();
        tally.observations += 1;
        tally.minimum = tally.minimum.min(value);
        tally.maximum = tally.maximum.max(value);
    }

    fn value_for_index(&self, index: u64) -> f64 {
        let tally = self.tally.read().unwrap();
        self.estimate(&tally, index)
    }

    fn value_for_quantile(&self, quantile: f64) -> f64 {
        let tally = self.tally.read().unwrap();
        let index = quantile_to_index(quantile, tally.observations);
        self.estimate(&tally, index)
    }

    fn observations(&self) -> u64 {
        self.tally.read().unwrap().observations
    }

    fn reset(&self) {
        *self.tally.write().unwrap() = Tally::EMPTY;
    }
}

impl fmt::Display for TallyingBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tally = self.tally.read().unwrap();
        if tally.observations == 0 {
            return write!(f, "[TallyingBucket (Empty)]");
        }

        write!(
            f,
            "[TallyingBucket ({}, {}); {} items]",
            tally.minimum, tally.maximum, tally.observations
        )
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use proptest::{collection::vec as arb_vec, prelude::*};

    use super::*;
    use crate::bucket::{AverageEstimator, MaximumEstimator, UniformEstimator};

    fn all_estimators() -> Vec<TallyingBucket> {
        vec![
            TallyingBucket::new(),
            TallyingBucket::with_estimator(MaximumEstimator),
            TallyingBucket::with_estimator(AverageEstimator),
            TallyingBucket::with_estimator(UniformEstimator),
            TallyingBucket::with_estimator(|minimum: f64, _: f64, _: u64, _: u64| minimum * 2.0),
        ]
    }

    #[test]
    fn tracks_extrema() {
        let bucket = TallyingBucket::new();
        assert_eq!(bucket.extrema(), None);

        for value in [5.0, 1.0, 10.0, 1.1, 4.0] {
            bucket.add(value);
        }

        assert_eq!(bucket.extrema(), Some((1.0, 10.0)));
        assert_eq!(bucket.observations(), 5);
        assert_eq!(bucket.value_for_index(3), 1.0);
    }

    #[test]
    fn negative_stream() {
        let bucket = TallyingBucket::with_estimator(MaximumEstimator);
        for value in [-5.0, -2.0, -9.0] {
            bucket.add(value);
        }

        assert_eq!(bucket.extrema(), Some((-9.0, -2.0)));
        assert_eq!(bucket.value_for_quantile(1.0), -2.0);
    }

    #[test]
    fn reset_yields_nan_for_every_estimator() {
        for bucket in all_estimators() {
            for value in [3.0, 7.0, 11.0] {
                bucket.add(value);
            }
            assert!(!bucket.value_for_index(1).is_nan());

            bucket.reset();
            assert_eq!(bucket.observations(), 0);
            assert_eq!(bucket.extrema(), None);
            for index in [0, 1, 2, 100] {
                assert!(bucket.value_for_index(index).is_nan());
            }
            assert!(bucket.value_for_quantile(0.5).is_nan());
        }
    }

    #[test]
    fn uniform_estimator_thirds() {
        let bucket = TallyingBucket::with_estimator(UniformEstimator);
        for value in [0.0, 100.0, 50.0] {
            bucket.add(value);
        }

        assert_eq!(bucket.value_for_index(0), 0.0);
        assert_eq!(bucket.value_for_index(1), 50.0);
        assert_eq!(bucket.value_for_index(2), 100.0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn index_beyond_observations_panics() {
        let bucket = TallyingBucket::new();
        bucket.add(1.0);
        bucket.value_for_index(5);
    }

    #[test]
    fn display() {
        let bucket = TallyingBucket::new();
        assert_eq!(bucket.to_string(), "[TallyingBucket (Empty)]");

        bucket.add(2.5);
        bucket.add(-1.0);
        assert_eq!(bucket.to_string(), "[TallyingBucket (-1, 2.5); 2 items]");
    }

    #[test]
    fn concurrent_adds_then_reset() {
        let bucket = Arc::new(TallyingBucket::with_estimator(AverageEstimator));

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
        assert_eq!(bucket.extrema(), Some((0.0, 7999.0)));

        bucket.reset();
        assert_eq!(bucket.observations(), 0);
    }

    proptest! {
        #[test]
        fn property_test_extrema_ordered(values in arb_vec(-1.0e12..1.0e12f64, 1..128)) {
            let bucket = TallyingBucket::new();
            for value in &values {
                bucket.add(*value);
            }

            let (minimum, maximum) = bucket.extrema().unwrap();
            prop_assert!(minimum <= maximum);
            prop_assert!(values.iter().all(|v| *v >= minimum && *v <= maximum));
        }
    }
}
