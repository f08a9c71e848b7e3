//! Core instrumentation primitives.
//!
//! Observations are recorded into label-keyed metrics (counters, gauges, and summaries), registered with an explicitly
//! constructed [`Registry`][registry::Registry], and rendered by the [`exposition`] formatters. Summaries answer
//! quantile queries from bounded-memory [`bucket`]s.

pub mod bucket;

pub mod config;

mod counter;
pub use self::counter::Counter;

pub mod exposition;

mod gauge;
pub use self::gauge::Gauge;

pub mod metric;
pub use self::metric::{Metric, MetricFamily, MetricPoint, MetricType, PointValue};

pub mod registry;

mod scalar;

pub mod summary;
pub use self::summary::{QuantileEstimate, Summary, SummaryOptions, SummarySnapshot};
