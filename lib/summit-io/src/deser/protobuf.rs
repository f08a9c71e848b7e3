//! Length-delimited protocol buffers `MetricFamily` streams.

use prost::Message as _;
use snafu::ResultExt as _;
use summit_context::{LabelSet, METRIC_NAME_LABEL};
use tracing::debug;

use super::{DecodeError, Ingester, ProcessOptions, Processor, Protobuf, Sample};

/// Label added to every per-quantile sample decoded from a summary.
const QUANTILE_LABEL: &str = "quantile";

/// A name/value label pair.
#[derive(Clone, PartialEq, prost::Message)]
pub struct LabelPair {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub value: Option<String>,
}

/// Type of a metric family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MetricType {
    Counter = 0,
    Gauge = 1,
    Summary = 2,
    Untyped = 3,
    Histogram = 4,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Gauge {
    #[prost(double, optional, tag = "1")]
    pub value: Option<f64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Counter {
    #[prost(double, optional, tag = "1")]
    pub value: Option<f64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Quantile {
    #[prost(double, optional, tag = "1")]
    pub quantile: Option<f64>,
    #[prost(double, optional, tag = "2")]
    pub value: Option<f64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Summary {
    #[prost(uint64, optional, tag = "1")]
    pub sample_count: Option<u64>,
    #[prost(double, optional, tag = "2")]
    pub sample_sum: Option<f64>,
    #[prost(message, repeated, tag = "3")]
    pub quantile: Vec<Quantile>,
}

/// A single labeled metric within a family.
///
/// Only the value kinds this crate decodes are declared; fields for other kinds are skipped while decoding.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Metric {
    #[prost(message, repeated, tag = "1")]
    pub label: Vec<LabelPair>,
    #[prost(message, optional, tag = "2")]
    pub gauge: Option<Gauge>,
    #[prost(message, optional, tag = "3")]
    pub counter: Option<Counter>,
    #[prost(message, optional, tag = "4")]
    pub summary: Option<Summary>,
    #[prost(int64, optional, tag = "6")]
    pub timestamp_ms: Option<i64>,
}

/// A named, typed group of metrics.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MetricFamily {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub help: Option<String>,
    #[prost(enumeration = "MetricType", optional, tag = "3")]
    pub r#type: Option<i32>,
    #[prost(message, repeated, tag = "4")]
    pub metric: Vec<Metric>,
}

/// Processor for varint length-delimited streams of `io.prometheus.client.MetricFamily` records.
///
/// Every record is decoded and ingested as one batch: counters and gauges yield one sample per metric, and summaries
/// yield one sample per quantile (labeled with `quantile`) plus `<name>_sum` and `<name>_count` samples when present.
/// Families of other types are skipped. The stream ends cleanly when the input is exhausted at a record boundary.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricFamilyProcessor;

impl Processor for MetricFamilyProcessor {
    fn process_single(
        &self, mut input: &[u8], options: &ProcessOptions, ingester: &mut dyn Ingester,
    ) -> Result<(), DecodeError> {
        while !input.is_empty() {
            let family = MetricFamily::decode_length_delimited(&mut input).context(Protobuf)?;
            let family_type = family.r#type.and_then(|raw| MetricType::try_from(raw).ok());

            let samples = match family_type {
                Some(MetricType::Counter) => {
                    extract_scalars(&family, options, |metric| metric.counter.as_ref().map(Counter::value))
                }
                Some(MetricType::Gauge) => {
                    extract_scalars(&family, options, |metric| metric.gauge.as_ref().map(Gauge::value))
                }
                Some(MetricType::Summary) => extract_summaries(&family, options),
                _ => {
                    debug!(family = family.name(), "Skipping metric family of unsupported type.");
                    continue;
                }
            };

            ingester.ingest(Ok(samples));
        }

        Ok(())
    }
}

fn metric_labels(metric: &Metric, name: &str) -> LabelSet {
    metric
        .label
        .iter()
        .map(|pair| (pair.name(), pair.value()))
        .collect::<LabelSet>()
        .with_label(METRIC_NAME_LABEL, name)
}

fn extract_scalars<F>(family: &MetricFamily, options: &ProcessOptions, value_of: F) -> Vec<Sample>
where
    F: Fn(&Metric) -> Option<f64>,
{
    family
        .metric
        .iter()
        .filter_map(|metric| {
            let value = value_of(metric)?;
            Some(options.sample(metric_labels(metric, family.name()), value))
        })
        .collect()
}

fn extract_summaries(family: &MetricFamily, options: &ProcessOptions) -> Vec<Sample> {
    let name = family.name();
    let mut samples = Vec::new();

    for metric in &family.metric {
        let Some(summary) = &metric.summary else {
            continue;
        };

        for quantile in &summary.quantile {
            let labels = metric_labels(metric, name).with_label(QUANTILE_LABEL, quantile.quantile().to_string());
            samples.push(options.sample(labels, quantile.value()));
        }

        if let Some(sum) = summary.sample_sum {
            let labels = metric_labels(metric, &format!("{}_sum", name));
            samples.push(options.sample(labels, sum));
        }

        if let Some(count) = summary.sample_count {
            let labels = metric_labels(metric, &format!("{}_count", name));
            samples.push(options.sample(labels, count as f64));
        }
    }

    samples
}
