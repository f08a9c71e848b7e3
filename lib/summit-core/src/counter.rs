use summit_context::LabelSet;

use crate::{scalar::LabeledValues, Metric, MetricPoint, MetricType, PointValue};

/// A label-keyed counter.
///
/// Each distinct label set tracks its own value, starting at zero on first use.
#[derive(Default)]
pub struct Counter {
    values: LabeledValues,
}

impl Counter {
    /// Creates a new, empty `Counter`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the series identified by `labels` by one.
    pub fn increment(&self, labels: &LabelSet) {
        self.increment_by(labels, 1.0);
    }

    /// Increments the series identified by `labels` by `value`.
    ///
    /// # Panics
    ///
    /// Panics if `value` is negative or NaN.
    pub fn increment_by(&self, labels: &LabelSet, value: f64) {
        assert!(value >= 0.0, "counter increments must be non-negative, got {}", value);
        self.values.update(labels, |current| current + value);
    }

    /// Decrements the series identified by `labels` by one.
    pub fn decrement(&self, labels: &LabelSet) {
        self.decrement_by(labels, 1.0);
    }

    /// Decrements the series identified by `labels` by `value`.
    ///
    /// # Panics
    ///
    /// Panics if `value` is negative or NaN.
    pub fn decrement_by(&self, labels: &LabelSet, value: f64) {
        assert!(value >= 0.0, "counter decrements must be non-negative, got {}", value);
        self.values.update(labels, |current| current - value);
    }

    /// Sets the series identified by `labels` to `value`.
    pub fn set(&self, labels: &LabelSet, value: f64) {
        self.values.update(labels, |_| value);
    }

    /// Returns the value of the series identified by `labels`, or `None` if it has never been touched.
    pub fn value(&self, labels: &LabelSet) -> Option<f64> {
        self.values.get(labels)
    }

    /// Returns the number of series.
    pub fn series_count(&self) -> usize {
        self.values.len()
    }
}

impl Metric for Counter {
    fn metric_type(&self) -> MetricType {
        MetricType::Counter
    }

    fn reset_all(&self) {
        self.values.clear();
    }

    fn collect(&self) -> Vec<MetricPoint> {
        self.values
            .snapshot()
            .into_iter()
            .map(|(labels, value)| MetricPoint {
                labels,
                value: PointValue::Counter(value),
            })
            .collect()
    }
}
