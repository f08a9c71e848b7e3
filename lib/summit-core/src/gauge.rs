use summit_context::LabelSet;

use crate::{scalar::LabeledValues, Metric, MetricPoint, MetricType, PointValue};

/// A label-keyed gauge.
#[derive(Default)]
pub struct Gauge {
    values: LabeledValues,
}

impl Gauge {
    /// Creates a new, empty `Gauge`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the series identified by `labels` to `value`.
    pub fn set(&self, labels: &LabelSet, value: f64) {
        self.values.update(labels, |_| value);
    }

    /// Returns the value of the series identified by `labels`, or `None` if it has never been set.
    pub fn value(&self, labels: &LabelSet) -> Option<f64> {
        self.values.get(labels)
    }

    /// Returns the number of series.
    pub fn series_count(&self) -> usize {
        self.values.len()
    }
}

impl Metric for Gauge {
    fn metric_type(&self) -> MetricType {
        MetricType::Gauge
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
                value: PointValue::Gauge(value),
            })
            .collect()
    }
}
