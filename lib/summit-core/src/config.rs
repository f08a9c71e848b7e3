//! Serde-deserializable configuration for building summaries.

use std::{num::NonZeroUsize, sync::Arc};

use serde::Deserialize;
use summit_stats::Reducer;

use crate::bucket::{
    AccumulatingBucketBuilder, AverageEstimator, BucketBuilder, BucketError, CoalesceOldest, EvictLargest,
    EvictNewest, EvictOldest, EvictRandom, EvictSmallest, EvictionPolicy, IndexEstimator, MaximumEstimator,
    MinimumEstimator, TallyingBucketBuilder, UniformEstimator,
};

pub(crate) const DEFAULT_BUCKET_CAPACITY: NonZeroUsize = match NonZeroUsize::new(50) {
    Some(capacity) => capacity,
    None => panic!("default bucket capacity must be non-zero"),
};

const fn default_capacity() -> usize {
    DEFAULT_BUCKET_CAPACITY.get()
}

fn default_quantiles() -> Vec<f64> {
    vec![0.01, 0.05, 0.5, 0.9, 0.99]
}

/// A statistical reducer, by name.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReducerKind {
    /// Arithmetic mean.
    Average,

    /// Most frequent value.
    FirstMode,

    /// Median.
    Median,

    /// Smallest value.
    Minimum,

    /// Largest value.
    Maximum,
}

impl ReducerKind {
    /// Returns the reducer function.
    pub fn reducer(self) -> Reducer {
        match self {
            Self::Average => summit_stats::average,
            Self::FirstMode => summit_stats::first_mode,
            Self::Median => summit_stats::median,
            Self::Minimum => summit_stats::minimum,
            Self::Maximum => summit_stats::maximum,
        }
    }
}

/// Eviction policy for accumulating buckets.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EvictionConfiguration {
    /// Evict the most recently added sample.
    Newest,

    /// Evict the least recently added sample.
    #[default]
    Oldest,

    /// Evict a random sample.
    Random,

    /// Evict the smallest sample.
    Smallest,

    /// Evict the largest sample.
    Largest,

    /// Fold the two oldest samples into one with the given reducer.
    CoalesceOldest(ReducerKind),
}

impl EvictionConfiguration {
    /// Creates the configured eviction policy.
    pub fn build(self) -> Arc<dyn EvictionPolicy> {
        match self {
            Self::Newest => Arc::new(EvictNewest),
            Self::Oldest => Arc::new(EvictOldest),
            Self::Random => Arc::new(EvictRandom),
            Self::Smallest => Arc::new(EvictSmallest),
            Self::Largest => Arc::new(EvictLargest),
            Self::CoalesceOldest(reducer) => Arc::new(CoalesceOldest(reducer.reducer())),
        }
    }
}

/// Index estimator for tallying buckets.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorConfiguration {
    /// Report the smallest observed value.
    #[default]
    Minimum,

    /// Report the largest observed value.
    Maximum,

    /// Report the mean of the extrema.
    Average,

    /// Report the minimum, the mean, or the maximum depending on which third of the observations the index falls in.
    Uniform,
}

impl EstimatorConfiguration {
    fn build(self) -> TallyingBucketBuilder {
        fn builder<E: IndexEstimator + 'static>(estimator: E) -> TallyingBucketBuilder {
            TallyingBucketBuilder::new(estimator)
        }

        match self {
            Self::Minimum => builder(MinimumEstimator),
            Self::Maximum => builder(MaximumEstimator),
            Self::Average => builder(AverageEstimator),
            Self::Uniform => builder(UniformEstimator),
        }
    }
}

/// Bucket strategy.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BucketConfiguration {
    /// Retain up to `capacity` raw samples, evicting with the given policy once full.
    Accumulating {
        #[serde(default = "default_capacity")]
        capacity: usize,

        #[serde(default)]
        eviction: EvictionConfiguration,
    },

    /// Track only the extrema and answer with the given estimator.
    Tallying {
        #[serde(default)]
        estimator: EstimatorConfiguration,
    },
}

impl BucketConfiguration {
    /// Creates a builder for the configured bucket strategy.
    ///
    /// # Errors
    ///
    /// If an accumulating bucket is configured with a capacity of zero, an error is returned.
    pub fn build(&self) -> Result<Arc<dyn BucketBuilder>, BucketError> {
        match self {
            Self::Accumulating { capacity, eviction } => {
                let capacity = NonZeroUsize::new(*capacity).ok_or(BucketError::ZeroCapacity)?;
                Ok(Arc::new(AccumulatingBucketBuilder::from_shared(eviction.build(), capacity)))
            }
            Self::Tallying { estimator } => Ok(Arc::new(estimator.build())),
        }
    }
}

impl Default for BucketConfiguration {
    fn default() -> Self {
        Self::Accumulating {
            capacity: default_capacity(),
            eviction: EvictionConfiguration::default(),
        }
    }
}

/// Summary configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SummaryConfiguration {
    /// Bucket strategy used for every series.
    ///
    /// Defaults to accumulating buckets of 50 samples that evict the oldest sample.
    #[serde(default)]
    pub bucket: BucketConfiguration,

    /// Quantiles reported for every series.
    ///
    /// Defaults to 0.01, 0.05, 0.5, 0.9, and 0.99.
    #[serde(default = "default_quantiles")]
    pub quantiles: Vec<f64>,

    /// Confidence level used for quantile rank intervals.
    ///
    /// Defaults to 0.95.
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl Default for SummaryConfiguration {
    fn default() -> Self {
        Self {
            bucket: BucketConfiguration::default(),
            quantiles: default_quantiles(),
            confidence: None,
        }
    }
}
