//! Metric types and the snapshot model shared by the registry and the renderers.

use summit_context::LabelSet;

/// Metric type.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MetricType {
    /// A monotonically increasing value.
    Counter,

    /// A value that can go up and down.
    Gauge,

    /// Quantiles, sum, and count of a stream of observations.
    Summary,
}

impl MetricType {
    /// Returns the name of the type as used in the text exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Summary => "summary",
        }
    }
}

/// The value of a single series at collection time.
#[derive(Clone, Debug, PartialEq)]
pub enum PointValue {
    /// Counter value.
    Counter(f64),

    /// Gauge value.
    Gauge(f64),

    /// Summary quantiles, as `(quantile, value)` pairs, plus the sum and count of observations.
    Summary {
        quantiles: Vec<(f64, f64)>,
        sum: f64,
        count: u64,
    },
}

/// A single series of a metric at collection time.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricPoint {
    /// Labels identifying the series.
    pub labels: LabelSet,

    /// Value of the series.
    pub value: PointValue,
}

/// A registered metric and all of its series at collection time.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricFamily {
    /// Metric name.
    pub name: String,

    /// Help text.
    pub help: String,

    /// Metric type.
    pub metric_type: MetricType,

    /// Labels attached to every series of this metric at registration.
    pub base_labels: LabelSet,

    /// Series, ordered by labels.
    pub points: Vec<MetricPoint>,
}

impl MetricFamily {
    /// Returns an iterator over the points with the base labels merged into each of them.
    ///
    /// Labels of the point win over base labels with the same name.
    pub fn merged_points(&self) -> impl Iterator<Item = (LabelSet, &PointValue)> + '_ {
        self.points
            .iter()
            .map(|point| (self.base_labels.merged(&point.labels), &point.value))
    }
}

/// A label-keyed metric that can be registered and collected.
pub trait Metric: Send + Sync {
    /// Returns the type of this metric.
    fn metric_type(&self) -> MetricType;

    /// Drops every series.
    fn reset_all(&self);

    /// Returns a snapshot of every series, ordered by labels.
    fn collect(&self) -> Vec<MetricPoint>;
}
