use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use snafu::ResultExt as _;
use summit_context::LabelSet;

use super::{format_value, ExpositionError, Serialization};
use crate::{MetricFamily, MetricType, PointValue};

/// Label carrying the metric name within the base labels of an entity.
const NAME_LABEL: &str = "name";

#[derive(Serialize)]
struct Entity<'a> {
    #[serde(rename = "baseLabels")]
    base_labels: LabelSet,
    docstring: &'a str,
    metric: EntityMetric<'a>,
}

#[derive(Serialize)]
struct EntityMetric<'a> {
    #[serde(rename = "type")]
    metric_type: &'static str,
    value: EntityValues<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EntityValues<'a> {
    Scalars(Vec<ScalarValue<'a>>),
    Histograms(Vec<HistogramValue<'a>>),
}

#[derive(Serialize)]
struct ScalarValue<'a> {
    labels: &'a LabelSet,
    value: SampleValue,
}

#[derive(Serialize)]
struct HistogramValue<'a> {
    labels: &'a LabelSet,
    value: BTreeMap<String, SampleValue>,
}

/// A sample value, written as a JSON number when finite and as a string otherwise.
struct SampleValue(f64);

impl Serialize for SampleValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_finite() {
            serializer.serialize_f64(self.0)
        } else {
            serializer.serialize_str(&format_value(self.0))
        }
    }
}

/// Renders metric families in the JSON telemetry schema, version 0.0.2.
///
/// Every family becomes one entity whose base labels include the metric name under `name`. Summaries are written as
/// entities of type `histogram`, mapping each quantile to its value; their sums and counts have no place in this schema
/// and are omitted.
///
/// # Errors
///
/// If serialization fails, an error is returned.
pub fn render_json(families: &[MetricFamily]) -> Result<String, ExpositionError> {
    let entities = families.iter().map(to_entity).collect::<Vec<_>>();
    serde_json::to_string(&entities).context(Serialization)
}

fn to_entity(family: &MetricFamily) -> Entity<'_> {
    let base_labels = family.base_labels.clone().with_label(NAME_LABEL, family.name.as_str());

    let mut scalars = Vec::new();
    let mut histograms = Vec::new();
    for point in &family.points {
        match &point.value {
            PointValue::Counter(value) | PointValue::Gauge(value) => scalars.push(ScalarValue {
                labels: &point.labels,
                value: SampleValue(*value),
            }),
            PointValue::Summary { quantiles, .. } => histograms.push(HistogramValue {
                labels: &point.labels,
                value: quantiles
                    .iter()
                    .map(|(quantile, value)| (quantile.to_string(), SampleValue(*value)))
                    .collect(),
            }),
        }
    }

    let (metric_type, value) = match family.metric_type {
        MetricType::Counter => ("counter", EntityValues::Scalars(scalars)),
        MetricType::Gauge => ("gauge", EntityValues::Scalars(scalars)),
        MetricType::Summary => ("histogram", EntityValues::Histograms(histograms)),
    };

    Entity {
        base_labels,
        docstring: &family.help,
        metric: EntityMetric { metric_type, value },
    }
}
