use std::{collections::BTreeMap, fmt};

use serde::{
    de::{self, Unexpected, Visitor},
    Deserialize, Deserializer,
};
use snafu::ResultExt as _;
use summit_context::{LabelSet, METRIC_NAME_LABEL};
use tracing::warn;

use super::{DecodeError, Ingester, InvalidValue, Json, ProcessOptions, Processor, Sample, UnknownMetricType};

/// Base label under which the JSON telemetry schema carries the metric name.
const NAME_LABEL: &str = "name";

/// Label added to every sample decoded from a `histogram` entity.
const PERCENTILE_LABEL: &str = "percentile";

#[derive(Deserialize)]
struct Entity {
    #[serde(rename = "baseLabels", default)]
    base_labels: LabelSet,
    metric: EntityMetric,
}

#[derive(Deserialize)]
struct EntityMetric {
    #[serde(rename = "type")]
    metric_type: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Deserialize)]
struct ScalarValue {
    #[serde(default)]
    labels: LabelSet,
    value: SampleValue,
}

#[derive(Deserialize)]
struct HistogramValue {
    #[serde(default)]
    labels: LabelSet,
    value: BTreeMap<String, SampleValue>,
}

/// A sample value, accepted either as a JSON number or as a string such as `"NaN"` or `"+Inf"`.
struct SampleValue(f64);

impl<'de> Deserialize<'de> for SampleValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SampleValueVisitor;

        impl Visitor<'_> for SampleValueVisitor {
            type Value = SampleValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number or a numeric string")
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<SampleValue, E> {
                Ok(SampleValue(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<SampleValue, E> {
                Ok(SampleValue(value as f64))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<SampleValue, E> {
                Ok(SampleValue(value as f64))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<SampleValue, E> {
                parse_sample_value(value)
                    .map(SampleValue)
                    .ok_or_else(|| E::invalid_value(Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_any(SampleValueVisitor)
    }
}

fn parse_sample_value(raw: &str) -> Option<f64> {
    match raw {
        "NaN" => Some(f64::NAN),
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

/// Processor for the JSON telemetry schema, version 0.0.2.
///
/// The payload is an array of entities, each with base labels, a docstring, and a typed metric value. `counter` and
/// `gauge` entities carry an array of labeled values; `histogram` entities carry an array of labeled percentile maps
/// and yield one sample per percentile, labeled with `percentile`.
///
/// An entity whose value does not match its type, or whose type is unknown, is reported to the ingester as an error
/// and skipped. All samples from the remaining entities are ingested as a single batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonProcessor;

impl Processor for JsonProcessor {
    fn process_single(
        &self, input: &[u8], options: &ProcessOptions, ingester: &mut dyn Ingester,
    ) -> Result<(), DecodeError> {
        let entities: Vec<Entity> = serde_json::from_slice(input).context(Json)?;

        let mut samples = Vec::new();
        for entity in entities {
            if let Err(e) = decode_entity(entity, options, &mut samples) {
                warn!(error = %e, "Skipping undecodable entity.");
                ingester.ingest(Err(e));
            }
        }

        if !samples.is_empty() {
            ingester.ingest(Ok(samples));
        }

        Ok(())
    }
}

fn decode_entity(entity: Entity, options: &ProcessOptions, samples: &mut Vec<Sample>) -> Result<(), DecodeError> {
    let Entity { mut base_labels, metric } = entity;
    if let Some(name) = base_labels.remove(NAME_LABEL) {
        base_labels.insert(METRIC_NAME_LABEL, name);
    }

    match metric.metric_type.as_str() {
        "counter" | "gauge" => {
            let values: Vec<ScalarValue> = serde_json::from_value(metric.value).context(InvalidValue {
                metric_type: &metric.metric_type,
            })?;

            for scalar in values {
                let labels = base_labels.merged(&scalar.labels);
                samples.push(options.sample(labels, scalar.value.0));
            }
        }
        "histogram" => {
            let values: Vec<HistogramValue> = serde_json::from_value(metric.value).context(InvalidValue {
                metric_type: &metric.metric_type,
            })?;

            for histogram in values {
                let entity_labels = base_labels.merged(&histogram.labels);
                for (percentile, value) in histogram.value {
                    let labels = entity_labels.clone().with_label(PERCENTILE_LABEL, percentile);
                    samples.push(options.sample(labels, value.0));
                }
            }
        }
        _ => return UnknownMetricType { metric_type: metric.metric_type }.fail(),
    }

    Ok(())
}
