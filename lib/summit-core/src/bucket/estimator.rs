use std::sync::Arc;

use summit_stats::average;

const LOWER_THIRD: f64 = 1.0 / 3.0;
const UPPER_THIRD: f64 = 2.0 / 3.0;

/// A strategy for estimating the value at an index from the extrema of a stream.
///
/// [`TallyingBucket`][super::TallyingBucket] only tracks the smallest and largest observed values, so its answers are
/// interpolated by an estimator rather than looked up.
///
/// Estimators are never called for a bucket without observations: [`EmptyGuard`] answers those with NaN before the
/// estimator runs. Any `Fn(f64, f64, u64, u64) -> f64` closure taking `(minimum, maximum, index, observations)` is also
/// an estimator.
pub trait IndexEstimator: Send + Sync {
    /// Estimates the value at `index` out of `observations`, given the observed extrema.
    fn estimate(&self, minimum: f64, maximum: f64, index: u64, observations: u64) -> f64;
}

impl<F> IndexEstimator for F
where
    F: Fn(f64, f64, u64, u64) -> f64 + Send + Sync,
{
    fn estimate(&self, minimum: f64, maximum: f64, index: u64, observations: u64) -> f64 {
        self(minimum, maximum, index, observations)
    }
}

/// Wraps an estimator so that it yields NaN whenever there are no observations.
#[derive(Clone)]
pub struct EmptyGuard {
    inner: Arc<dyn IndexEstimator>,
}

impl EmptyGuard {
    /// Creates a new `EmptyGuard` around the given estimator.
    pub fn new<E>(estimator: E) -> Self
    where
        E: IndexEstimator + 'static,
    {
        Self::from_shared(Arc::new(estimator))
    }

    pub(super) fn from_shared(inner: Arc<dyn IndexEstimator>) -> Self {
        Self { inner }
    }
}

impl IndexEstimator for EmptyGuard {
    fn estimate(&self, minimum: f64, maximum: f64, index: u64, observations: u64) -> f64 {
        if observations == 0 {
            return f64::NAN;
        }

        self.inner.estimate(minimum, maximum, index, observations)
    }
}

/// Always reports the smallest observed value.
#[derive(Clone, Copy, Debug, Default)]
pub struct MinimumEstimator;

impl IndexEstimator for MinimumEstimator {
    fn estimate(&self, minimum: f64, _: f64, _: u64, _: u64) -> f64 {
        minimum
    }
}

/// Always reports the largest observed value.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaximumEstimator;

impl IndexEstimator for MaximumEstimator {
    fn estimate(&self, _: f64, maximum: f64, _: u64, _: u64) -> f64 {
        maximum
    }
}

/// Reports the mean of the extrema.
#[derive(Clone, Copy, Debug, Default)]
pub struct AverageEstimator;

impl IndexEstimator for AverageEstimator {
    fn estimate(&self, minimum: f64, maximum: f64, _: u64, _: u64) -> f64 {
        average(&[minimum, maximum])
    }
}

/// Splits the observations into thirds: the lower third reports the minimum, the upper third the maximum, and the middle
/// third the mean of the extrema.
///
/// A location of exactly two thirds, such as index 2 of 3 or 4 of 6, falls into the upper third. With a single
/// observation, the minimum is reported.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformEstimator;

impl IndexEstimator for UniformEstimator {
    fn estimate(&self, minimum: f64, maximum: f64, index: u64, observations: u64) -> f64 {
        if observations == 1 {
            return minimum;
        }

        let location = index as f64 / observations as f64;
        if location < LOWER_THIRD {
            minimum
        } else if location >= UPPER_THIRD {
            maximum
        } else {
            average(&[minimum, maximum])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_answers_empty_with_nan() {
        let estimators = [
            EmptyGuard::new(MinimumEstimator),
            EmptyGuard::new(MaximumEstimator),
            EmptyGuard::new(AverageEstimator),
            EmptyGuard::new(UniformEstimator),
            EmptyGuard::new(|_: f64, _: f64, _: u64, _: u64| 42.0),
        ];

        for estimator in &estimators {
            assert!(estimator.estimate(0.0, 100.0, 0, 0).is_nan());
            assert!(!estimator.estimate(0.0, 100.0, 0, 1).is_nan());
        }
    }

    #[test]
    fn simple_estimators() {
        assert_eq!(MinimumEstimator.estimate(-3.0, 9.0, 1, 2), -3.0);
        assert_eq!(MaximumEstimator.estimate(-3.0, 9.0, 1, 2), 9.0);
        assert_eq!(AverageEstimator.estimate(-3.0, 9.0, 1, 2), 3.0);
    }

    #[test]
    fn uniform_thirds() {
        assert_eq!(UniformEstimator.estimate(0.0, 100.0, 0, 3), 0.0);
        assert_eq!(UniformEstimator.estimate(0.0, 100.0, 1, 3), 50.0);
        assert_eq!(UniformEstimator.estimate(0.0, 100.0, 2, 3), 100.0);
        assert_eq!(UniformEstimator.estimate(0.0, 100.0, 3, 3), 100.0);

        assert_eq!(UniformEstimator.estimate(0.0, 100.0, 3, 10), 0.0);
        assert_eq!(UniformEstimator.estimate(0.0, 100.0, 5, 10), 50.0);
        assert_eq!(UniformEstimator.estimate(0.0, 100.0, 7, 10), 100.0);
    }

    #[test]
    fn uniform_two_thirds_is_upper() {
        for (index, observations) in [(2, 3), (4, 6), (6, 9), (200, 300)] {
            assert_eq!(UniformEstimator.estimate(0.0, 100.0, index, observations), 100.0);
        }

        // Just below two thirds stays in the middle.
        assert_eq!(UniformEstimator.estimate(0.0, 100.0, 199, 300), 50.0);
    }

    #[test]
    fn uniform_single_observation() {
        assert_eq!(UniformEstimator.estimate(4.0, 4.0, 1, 1), 4.0);
    }
}
