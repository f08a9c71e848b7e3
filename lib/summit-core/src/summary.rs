//! Label-keyed summaries backed by bounded-memory buckets.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use snafu::{ResultExt as _, Snafu};
use summit_context::LabelSet;
use summit_stats::quantile_rank_interval;
use tracing::debug;

use crate::{
    bucket::{AccumulatingBucketBuilder, Bucket, BucketBuilder, BucketError, EvictOldest},
    config::{SummaryConfiguration, DEFAULT_BUCKET_CAPACITY},
    Metric, MetricPoint, MetricType, PointValue,
};

const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Summary error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum SummaryError {
    /// The bucket strategy could not be built.
    #[snafu(display("invalid bucket configuration"))]
    InvalidBucket { source: BucketError },

    /// A reported quantile was outside of `[0, 1]`.
    #[snafu(display("quantile must be within [0, 1], got {}", quantile))]
    InvalidQuantile { quantile: f64 },

    /// The confidence level was outside of `(0, 1]`.
    #[snafu(display("confidence must be within (0, 1], got {}", confidence))]
    InvalidConfidence { confidence: f64 },
}

/// Summary options.
#[derive(Clone)]
pub struct SummaryOptions {
    quantiles: Vec<f64>,
    bucket_builder: Arc<dyn BucketBuilder>,
    confidence: f64,
}

impl SummaryOptions {
    /// Creates a new `SummaryOptions` using the given bucket builder.
    ///
    /// Reported quantiles default to 0.01, 0.05, 0.5, 0.9, and 0.99, and the confidence level to 0.95.
    pub fn new<B>(bucket_builder: B) -> Self
    where
        B: BucketBuilder + 'static,
    {
        let defaults = SummaryConfiguration::default();
        Self {
            quantiles: defaults.quantiles,
            bucket_builder: Arc::new(bucket_builder),
            confidence: DEFAULT_CONFIDENCE,
        }
    }

    /// Creates a new `SummaryOptions` from the given configuration.
    ///
    /// # Errors
    ///
    /// If the bucket strategy is invalid, or if any quantile or the confidence level is out of range, an error is
    /// returned.
    pub fn from_configuration(config: &SummaryConfiguration) -> Result<Self, SummaryError> {
        let bucket_builder = config.bucket.build().context(InvalidBucket)?;

        if let Some(quantile) = config.quantiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
            return Err(SummaryError::InvalidQuantile { quantile: *quantile });
        }

        let confidence = config.confidence.unwrap_or(DEFAULT_CONFIDENCE);
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(SummaryError::InvalidConfidence { confidence });
        }

        Ok(Self {
            quantiles: config.quantiles.clone(),
            bucket_builder,
            confidence,
        })
    }

    /// Sets the quantiles reported for every series.
    ///
    /// # Panics
    ///
    /// Panics if any quantile is not within `[0, 1]`.
    pub fn with_quantiles<I>(mut self, quantiles: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        self.quantiles = quantiles
            .into_iter()
            .inspect(|q| assert!((0.0..=1.0).contains(q), "quantile must be within [0, 1], got {}", q))
            .collect();
        self
    }

    /// Sets the confidence level used for quantile rank intervals.
    ///
    /// # Panics
    ///
    /// Panics if `confidence` is not within `(0, 1]`.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        assert!(
            confidence > 0.0 && confidence <= 1.0,
            "confidence must be within (0, 1], got {}",
            confidence
        );
        self.confidence = confidence;
        self
    }

    /// Returns the quantiles reported for every series.
    pub fn quantiles(&self) -> &[f64] {
        &self.quantiles
    }
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self::new(AccumulatingBucketBuilder::new(EvictOldest, DEFAULT_BUCKET_CAPACITY))
    }
}

/// A quantile estimate bracketed by a confidence interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuantileEstimate {
    /// Quantile that was estimated.
    pub quantile: f64,

    /// Point estimate.
    pub value: f64,

    /// Value at the lower end of the interval.
    pub lower: f64,

    /// Value at the upper end of the interval.
    pub upper: f64,

    /// Probability that the true quantile lies within `[lower, upper]`, assuming the retained samples are
    /// representative of the stream.
    pub coverage: f64,

    /// Number of retained samples the interval was computed from.
    pub samples: u64,

    /// Number of observations recorded by the series, retained or not.
    pub observations: u64,
}

/// A snapshot of a single summary series.
#[derive(Clone, Debug, PartialEq)]
pub struct SummarySnapshot {
    /// Labels identifying the series.
    pub labels: LabelSet,

    /// Reported quantiles, as `(quantile, value)` pairs.
    pub quantiles: Vec<(f64, f64)>,

    /// Sum of all observations.
    pub sum: f64,

    /// Number of observations.
    pub count: u64,
}

struct Series {
    labels: LabelSet,
    bucket: Box<dyn Bucket>,
    // Held across every bucket update, so the sum and the bucket's count always move together.
    sum: Mutex<f64>,
}

impl Series {
    fn new(labels: LabelSet, bucket: Box<dyn Bucket>) -> Self {
        Self {
            labels,
            bucket,
            sum: Mutex::new(0.0),
        }
    }

    fn observe(&self, value: f64) {
        let mut sum = self.sum.lock().unwrap();
        self.bucket.add(value);
        *sum += value;
    }

    fn reset(&self) {
        let mut sum = self.sum.lock().unwrap();
        self.bucket.reset();
        *sum = 0.0;
    }

    fn snapshot(&self, quantiles: &[f64]) -> SummarySnapshot {
        let sum = self.sum.lock().unwrap();
        SummarySnapshot {
            labels: self.labels.clone(),
            quantiles: quantiles
                .iter()
                .map(|q| (*q, self.bucket.value_for_quantile(*q)))
                .collect(),
            sum: *sum,
            count: self.bucket.observations(),
        }
    }
}

/// A label-keyed summary.
///
/// Every distinct label set gets its own bucket, created with the configured [`BucketBuilder`] the first time the label
/// set is observed. Series are keyed by the [signature](LabelSet::signature) of their labels.
pub struct Summary {
    options: SummaryOptions,
    series: RwLock<HashMap<u64, Arc<Series>>>,
}

impl Summary {
    /// Creates a new, empty `Summary`.
    pub fn new(options: SummaryOptions) -> Self {
        Self {
            options,
            series: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, labels: &LabelSet) -> Option<Arc<Series>> {
        let series = self.series.read().unwrap();
        series.get(&labels.signature()).cloned()
    }

    fn get_or_create(&self, labels: &LabelSet) -> Arc<Series> {
        let signature = labels.signature();
        if let Some(series) = self.series.read().unwrap().get(&signature) {
            return Arc::clone(series);
        }

        let mut series = self.series.write().unwrap();
        let entry = series.entry(signature).or_insert_with(|| {
            debug!(labels = %labels, signature, "Creating new summary series.");
            Arc::new(Series::new(labels.clone(), self.options.bucket_builder.build()))
        });
        Arc::clone(entry)
    }

    /// Records an observation for the series identified by `labels`.
    pub fn observe(&self, labels: &LabelSet, value: f64) {
        self.get_or_create(labels).observe(value);
    }

    /// Returns the value at `quantile` for the series identified by `labels`.
    ///
    /// Returns NaN if the series does not exist or has no observations.
    ///
    /// # Panics
    ///
    /// Panics if `quantile` is not within `[0, 1]`.
    pub fn quantile(&self, labels: &LabelSet, quantile: f64) -> f64 {
        match self.get(labels) {
            Some(series) => series.bucket.value_for_quantile(quantile),
            None => {
                assert!(
                    (0.0..=1.0).contains(&quantile),
                    "quantile must be within [0, 1], got {}",
                    quantile
                );
                f64::NAN
            }
        }
    }

    /// Returns the value at `quantile` for the series identified by `labels`, bracketed by a confidence interval
    /// drawn from the samples the series' bucket retains.
    ///
    /// The interval is sized for the number of retained samples, not the lifetime observation count, so a bucket that
    /// has evicted most of its stream reports a correspondingly wide interval. Its ends are the retained samples at
    /// either end of the binomial rank interval for the configured confidence level, clamped to the smallest and largest
    /// retained samples, and always include the point estimate.
    ///
    /// Returns `None` if the series does not exist, has no retained samples, or uses a bucket that keeps no raw
    /// samples.
    ///
    /// # Panics
    ///
    /// Panics if `quantile` is not within `[0, 1]`.
    pub fn quantile_with_confidence(&self, labels: &LabelSet, quantile: f64) -> Option<QuantileEstimate> {
        let series = self.get(labels)?;
        let samples = series.bucket.retained_samples()?;
        let retained = samples.len() as u64;
        let interval = quantile_rank_interval(retained, quantile, self.options.confidence)?;

        // Rank `k` means `k` retained samples fall below the quantile, so the interval runs from the `lower`-th
        // smallest sample to the `(upper + 1)`-th.
        let values = samples.values();
        let last = values.len() - 1;
        let value = samples.value_for_quantile(quantile);
        let lower = values[(interval.lower.saturating_sub(1) as usize).min(last)];
        let upper = values[(interval.upper as usize).min(last)];

        Some(QuantileEstimate {
            quantile,
            value,
            lower: lower.min(value),
            upper: upper.max(value),
            coverage: interval.coverage,
            samples: retained,
            observations: samples.observations(),
        })
    }

    /// Returns the number of observations for the series identified by `labels`.
    pub fn observations(&self, labels: &LabelSet) -> u64 {
        self.get(labels).map_or(0, |series| series.bucket.observations())
    }

    /// Clears the series identified by `labels`, keeping it registered.
    pub fn reset(&self, labels: &LabelSet) {
        if let Some(series) = self.get(labels) {
            series.reset();
        }
    }

    /// Returns the number of series.
    pub fn series_count(&self) -> usize {
        self.series.read().unwrap().len()
    }

    /// Returns a snapshot of every series, ordered by labels.
    pub fn snapshot(&self) -> Vec<SummarySnapshot> {
        let series = self.series.read().unwrap().values().cloned().collect::<Vec<_>>();

        let mut snapshots = series
            .into_iter()
            .map(|series| series.snapshot(&self.options.quantiles))
            .collect::<Vec<_>>();
        snapshots.sort_by(|a, b| a.labels.cmp(&b.labels));
        snapshots
    }
}

impl Metric for Summary {
    fn metric_type(&self) -> MetricType {
        MetricType::Summary
    }

    fn reset_all(&self) {
        let mut series = self.series.write().unwrap();
        debug!(series = series.len(), "Dropping all summary series.");
        series.clear();
    }

    fn collect(&self) -> Vec<MetricPoint> {
        self.snapshot()
            .into_iter()
            .map(|snapshot| MetricPoint {
                labels: snapshot.labels,
                value: PointValue::Summary {
                    quantiles: snapshot.quantiles,
                    sum: snapshot.sum,
                    count: snapshot.count,
                },
            })
            .collect()
    }
}
